// packages/recorder/src/utils/config.rs
//! Process-level recorder settings
//!
//! Settings are layered: built-in defaults, then an optional file, then
//! `RECORDER__*` environment variables (e.g. `RECORDER__CONSUMER__POP_TIMEOUT_MS=50`).
//! Per-run settings (output file, buffer size, codec) are not here; they arrive
//! with the `conf` command as a [`RecorderConf`](crate::recording::RecorderConf).

use crate::utils::errors::{RecorderError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub consumer: ConsumerSettings,
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
}

/// Consumer thread settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    /// Bounded wait on each pop; also the worst-case stop latency
    pub pop_timeout_ms: u64,

    /// Prefix for consumer thread names (`<prefix>-<recorder name>`)
    pub thread_name_prefix: String,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            pop_timeout_ms: 100,
            thread_name_prefix: "recorder".to_string(),
        }
    }
}

impl ConsumerSettings {
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    /// A zero pop timeout would spin the consumer
    pub fn validate(&self) -> Result<()> {
        if self.pop_timeout_ms == 0 {
            return Err(RecorderError::InvalidConfig(
                "consumer.pop_timeout_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Input queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Capacity of queues created through the registry
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { capacity: 100_000 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RecorderSettings {
    /// Load settings from the environment only
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Load settings from a file (any format the `config` crate recognizes by
    /// extension) with environment overrides on top. A missing file is an error,
    /// and so are values that fail [`validate`](Self::validate).
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("RECORDER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Sanity-check values that would make the consumer misbehave
    pub fn validate(&self) -> Result<()> {
        self.consumer.validate()?;
        if self.queue.capacity == 0 {
            return Err(RecorderError::InvalidConfig(
                "queue.capacity cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
