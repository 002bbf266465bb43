// packages/recorder/src/recording/commands.rs
//! Command table for host-driven lifecycle control
//!
//! Built once per recorder. Each entry maps a command name to a handler that
//! decodes the JSON arguments and calls the matching recorder method.
//!
//! | command | arguments                                   | reply          |
//! |---------|---------------------------------------------|----------------|
//! | `init`  | `{"input_queue": "<name>"}`                 | `null`         |
//! | `conf`  | [`RecorderConf`]                            | `null`         |
//! | `start` | ignored                                     | `null`         |
//! | `stop`  | ignored                                     | [`RunSummary`] |
//! | `info`  | ignored                                     | [`RunInfo`]    |
//!
//! [`RunSummary`]: crate::recording::recorder::RunSummary
//! [`RunInfo`]: crate::recording::metrics::RunInfo

use crate::recording::record::Record;
use crate::recording::recorder::{Recorder, RecorderConf};
use crate::utils::errors::{RecorderError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Handler invoked with the recorder and the raw command arguments
pub type CommandHandler<R> = fn(&Recorder<R>, &Value) -> Result<Value>;

/// Arguments of the `init` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitArgs {
    /// Registered name of the input queue
    pub input_queue: String,
}

/// Name → handler table
pub struct CommandTable<R: Record> {
    handlers: HashMap<&'static str, CommandHandler<R>>,
}

impl<R: Record> CommandTable<R> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Table with the recorder's lifecycle and telemetry commands
    pub fn for_recorder() -> Self {
        let mut table = Self::new();
        table.register("init", handle_init::<R>);
        table.register("conf", handle_conf::<R>);
        table.register("start", handle_start::<R>);
        table.register("stop", handle_stop::<R>);
        table.register("info", handle_info::<R>);
        table
    }

    pub fn register(&mut self, name: &'static str, handler: CommandHandler<R>) {
        self.handlers.insert(name, handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(&self, recorder: &Recorder<R>, name: &str, args: &Value) -> Result<Value> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| RecorderError::UnknownCommand(name.to_string()))?;

        debug!("Recorder '{}' executing '{}'", recorder.name(), name);
        let result = handler(recorder, args);

        if let Err(e) = &result {
            if e.is_fatal_to_run() {
                error!("Recorder '{}' '{}' reported a failed run: {}", recorder.name(), name, e);
            } else {
                warn!("Recorder '{}' '{}' rejected: {}", recorder.name(), name, e);
            }
        }
        result
    }
}

impl<R: Record> Default for CommandTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_args<T: DeserializeOwned>(command: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| RecorderError::InvalidArguments(format!("{}: {}", command, e)))
}

fn to_reply<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| RecorderError::InvalidArguments(format!("Cannot encode reply: {}", e)))
}

fn handle_init<R: Record>(recorder: &Recorder<R>, args: &Value) -> Result<Value> {
    let args: InitArgs = parse_args("init", args)?;
    recorder.init(&args.input_queue)?;
    Ok(Value::Null)
}

fn handle_conf<R: Record>(recorder: &Recorder<R>, args: &Value) -> Result<Value> {
    let conf: RecorderConf = parse_args("conf", args)?;
    recorder.configure(conf)?;
    Ok(Value::Null)
}

fn handle_start<R: Record>(recorder: &Recorder<R>, _args: &Value) -> Result<Value> {
    recorder.start()?;
    Ok(Value::Null)
}

fn handle_stop<R: Record>(recorder: &Recorder<R>, _args: &Value) -> Result<Value> {
    let summary = recorder.stop()?;
    to_reply(&summary)
}

fn handle_info<R: Record>(recorder: &Recorder<R>, _args: &Value) -> Result<Value> {
    to_reply(&recorder.get_info())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::lifecycle::LifecycleState;
    use crate::recording::record::FixedRecord;
    use crate::recording::record_queue::QueueRegistry;
    use crate::utils::config::ConsumerSettings;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    type Rec = FixedRecord<4>;

    fn recorder() -> Recorder<Rec> {
        let registry = Arc::new(QueueRegistry::new());
        registry.create("snb", 16);
        let settings = ConsumerSettings {
            pop_timeout_ms: 10,
            ..Default::default()
        };
        Recorder::new("cmd-test", registry, settings)
    }

    #[test]
    fn test_table_names() {
        let table = CommandTable::<Rec>::for_recorder();
        assert_eq!(table.names(), vec!["conf", "info", "init", "start", "stop"]);
        assert!(table.contains("conf"));
        assert!(!table.contains("scrap"));
    }

    #[test]
    fn test_unknown_command() {
        let recorder = recorder();
        let err = recorder.execute("scrap", &Value::Null).err().unwrap();
        assert!(matches!(err, RecorderError::UnknownCommand(name) if name == "scrap"));
    }

    #[test]
    fn test_bad_arguments() {
        let recorder = recorder();
        let err = recorder
            .execute("init", &json!({"queue": "snb"}))
            .err()
            .unwrap();
        assert!(matches!(err, RecorderError::InvalidArguments(_)));
        assert_eq!(recorder.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_full_command_sequence() {
        let recorder = recorder();
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.bin");

        recorder
            .execute("init", &json!({"input_queue": "snb"}))
            .unwrap();
        recorder
            .execute(
                "conf",
                &json!({
                    "output_file": path,
                    "stream_buffer_size": 64,
                    "compression_algorithm": "None"
                }),
            )
            .unwrap();
        assert_eq!(recorder.state(), LifecycleState::Configured);

        recorder.execute("start", &Value::Null).unwrap();
        let info = recorder.execute("info", &Value::Null).unwrap();
        assert_eq!(info["packets_processed"], json!(0));

        let summary = recorder.execute("stop", &Value::Null).unwrap();
        assert_eq!(summary["started"], json!(true));
        assert_eq!(summary["records_written"], json!(0));
        assert_eq!(recorder.state(), LifecycleState::Stopped);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stop_reports_failed_run() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }

        let registry = Arc::new(QueueRegistry::new());
        let producer = registry.create("snb", 16).producer();
        let settings = ConsumerSettings {
            pop_timeout_ms: 10,
            ..Default::default()
        };
        let recorder = Recorder::<Rec>::new("cmd-test", registry, settings);

        recorder
            .execute("init", &json!({"input_queue": "snb"}))
            .unwrap();
        recorder
            .execute(
                "conf",
                &json!({
                    "output_file": "/dev/full",
                    "stream_buffer_size": 4,
                    "compression_algorithm": "zstd"
                }),
            )
            .unwrap();
        recorder.execute("start", &Value::Null).unwrap();
        producer.push(FixedRecord::filled(1)).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while recorder.is_consuming() {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let err = recorder.execute("stop", &Value::Null).err().unwrap();
        assert!(err.is_fatal_to_run());
        assert_eq!(recorder.state(), LifecycleState::Stopped);
    }
}
