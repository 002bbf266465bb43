// packages/recorder/src/recording/recorder.rs
//! Lifecycle controller and consumer thread
//!
//! A [`Recorder`] owns one dedicated consumer thread per armed session:
//!
//! ```text
//!  init ──► ArmedWaitingStart ──conf──► Configured ──start──► Running
//!                 ▲                        │  ▲                   │
//!                 └──── failed conf ───────┘  └── conf (re-open)  │
//!                                                                 ▼
//!  conf (re-arm) ◄──────────────────────── Stopped ◄──────── stop
//! ```
//!
//! The thread is spawned at `init` and parks on a one-shot gate. `start` opens
//! the gate; from then on the thread owns the writer. `stop` counts the records
//! queued at that moment, clears the run flag and joins the thread, which takes
//! that many more records, then flushes and closes the file.

use crate::observability;
use crate::recording::buffered_writer::{BufferedFileWriter, WriterSummary};
use crate::recording::commands::CommandTable;
use crate::recording::compressor::{CompressionAlgorithm, CompressionLevel};
use crate::recording::lifecycle::{start_gate, GateOutcome, GateWaiter, LifecycleState, StartGate};
use crate::recording::metrics::{RunInfo, RunMetrics};
use crate::recording::record::Record;
use crate::recording::record_queue::QueueRegistry;
use crate::recording::source::RecordSource;
use crate::utils::config::ConsumerSettings;
use crate::utils::errors::{RecorderError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Per-run configuration, supplied with the `conf` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConf {
    /// Output file; replaced on every configure
    pub output_file: PathBuf,

    /// In-memory buffer size in bytes
    pub stream_buffer_size: usize,

    #[serde(default)]
    pub compression_algorithm: CompressionAlgorithm,

    #[serde(default)]
    pub compression_level: CompressionLevel,
}

impl RecorderConf {
    pub fn new(
        output_file: impl Into<PathBuf>,
        stream_buffer_size: usize,
        compression_algorithm: CompressionAlgorithm,
    ) -> Self {
        Self {
            output_file: output_file.into(),
            stream_buffer_size,
            compression_algorithm,
            compression_level: CompressionLevel::default(),
        }
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_file.as_os_str().is_empty() {
            return Err(RecorderError::InvalidConfig(
                "output_file cannot be empty".to_string(),
            ));
        }
        if self.stream_buffer_size == 0 {
            return Err(RecorderError::InvalidConfig(
                "stream_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a completed session, returned by `stop`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Session identifier assigned at configure
    pub session_id: Option<String>,

    /// Whether the gate was ever opened
    pub started: bool,

    pub output_file: Option<PathBuf>,
    pub records_written: u64,

    /// Payload bytes before compression
    pub bytes_written: u64,

    /// Time between start and the end of stop
    pub duration: Duration,
}

/// Consumer thread result: the closed writer's totals, or `None` if the gate
/// was aborted before start
type ConsumerResult = Result<Option<WriterSummary>>;

/// Controller state guarded by one lock; commands are serialized on it
struct Inner<R> {
    state: LifecycleState,
    source: Option<Arc<RecordSource<R>>>,
    gate: Option<StartGate>,
    consumer: Option<JoinHandle<ConsumerResult>>,
    conf: Option<RecorderConf>,
    session_id: Option<Ulid>,
    started_at: Option<Instant>,
}

/// Streaming record recorder
pub struct Recorder<R: Record> {
    name: String,
    settings: ConsumerSettings,
    registry: Arc<QueueRegistry<R>>,
    inner: Mutex<Inner<R>>,
    writer_slot: Arc<Mutex<Option<BufferedFileWriter>>>,
    running: Arc<AtomicBool>,

    /// Records queued when stop was issued; the consumer takes this many more
    drain_budget: Arc<AtomicUsize>,
    metrics: Arc<RunMetrics>,
    commands: CommandTable<R>,
}

impl<R: Record> Recorder<R> {
    /// Create an uninitialized recorder that binds queues from `registry`
    pub fn new(
        name: impl Into<String>,
        registry: Arc<QueueRegistry<R>>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            registry,
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                source: None,
                gate: None,
                consumer: None,
                conf: None,
                session_id: None,
                started_at: None,
            }),
            writer_slot: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            drain_budget: Arc::new(AtomicUsize::new(0)),
            metrics: Arc::new(RunMetrics::new()),
            commands: CommandTable::for_recorder(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Configuration of the current (or last) session
    pub fn conf(&self) -> Option<RecorderConf> {
        self.inner.lock().conf.clone()
    }

    /// Whether the consumer is currently draining records. Goes false on stop
    /// and when the consumer hits a fatal error.
    pub fn is_consuming(&self) -> bool {
        self.inner.lock().state == LifecycleState::Running && self.running.load(Ordering::Acquire)
    }

    /// Dispatch a named command through the command table
    pub fn execute(&self, command: &str, args: &serde_json::Value) -> Result<serde_json::Value> {
        self.commands.dispatch(self, command, args)
    }

    /// Bind the input queue and spawn the consumer behind a closed gate
    pub fn init(&self, queue_name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::require(&inner, "init", &[LifecycleState::Uninitialized])?;
        self.settings.validate()?;

        let queue = self.registry.resolve(queue_name)?;
        let source = Arc::new(RecordSource::new(queue_name, queue.consumer()));
        drop(queue);

        self.arm(&mut inner, source)?;
        inner.state = LifecycleState::ArmedWaitingStart;

        info!("Recorder '{}' bound to queue '{}'", self.name, queue_name);
        Ok(())
    }

    /// Open a fresh output file for the next run
    pub fn configure(&self, conf: RecorderConf) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::require(
            &inner,
            "conf",
            &[
                LifecycleState::ArmedWaitingStart,
                LifecycleState::Configured,
                LifecycleState::Stopped,
            ],
        )?;
        conf.validate()?;

        // Reconfiguring before start replaces the previous writer
        if let Some(mut previous) = self.writer_slot.lock().take() {
            debug!("Discarding writer for {}", previous.path().display());
            if let Err(e) = previous.close() {
                warn!("Closing previous writer failed: {}", e);
            }
        }
        if inner.state == LifecycleState::Configured {
            inner.state = LifecycleState::ArmedWaitingStart;
        }

        remove_previous_output(&conf.output_file);

        let writer = BufferedFileWriter::open(
            &conf.output_file,
            conf.stream_buffer_size,
            conf.compression_algorithm,
            conf.compression_level,
        )
        .map_err(|e| {
            error!("Recorder '{}' configure failed: {}", self.name, e);
            e
        })?;

        if inner.state == LifecycleState::Stopped {
            let source = inner.source.clone().ok_or_else(|| {
                RecorderError::ThreadFailed("stopped recorder has no bound source".to_string())
            })?;
            self.arm(&mut inner, source)?;
            inner.state = LifecycleState::ArmedWaitingStart;
        }

        *self.writer_slot.lock() = Some(writer);

        let session_id = Ulid::new();
        info!(
            "Recorder '{}' configured: session {}, output {}, buffer {} bytes, compression {}",
            self.name,
            session_id,
            conf.output_file.display(),
            conf.stream_buffer_size,
            conf.compression_algorithm
        );

        inner.session_id = Some(session_id);
        inner.conf = Some(conf);
        inner.started_at = None;
        inner.state = LifecycleState::Configured;
        Ok(())
    }

    /// Release the consumer
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::require(&inner, "start", &[LifecycleState::Configured])?;

        let opened = match inner.gate.as_mut() {
            Some(gate) => gate.open(),
            None => false,
        };
        if !opened {
            return Err(RecorderError::ThreadFailed(
                "consumer thread is not waiting at the start gate".to_string(),
            ));
        }

        inner.started_at = Some(Instant::now());
        inner.state = LifecycleState::Running;
        info!("Recorder '{}' started", self.name);
        Ok(())
    }

    /// Stop the consumer and close the output. Blocks until the file is flushed.
    pub fn stop(&self) -> Result<RunSummary> {
        let mut inner = self.inner.lock();
        Self::require(
            &inner,
            "stop",
            &[
                LifecycleState::ArmedWaitingStart,
                LifecycleState::Configured,
                LifecycleState::Running,
            ],
        )?;

        let started = inner.state == LifecycleState::Running;
        let result = self.shutdown_consumer(&mut inner);
        inner.state = LifecycleState::Stopped;

        let duration = inner
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default();

        // Never started: the writer is still parked in the slot
        let parked = self.writer_slot.lock().take();
        let summary = match (result?, parked) {
            (Some(summary), _) => Some(summary),
            (None, Some(mut writer)) => Some(writer.close()?),
            (None, None) => None,
        };

        let summary = RunSummary {
            session_id: inner.session_id.map(|id| id.to_string()),
            started,
            output_file: summary.as_ref().map(|s| s.path.clone()),
            records_written: summary.as_ref().map_or(0, |s| s.records_written),
            bytes_written: summary.as_ref().map_or(0, |s| s.bytes_written),
            duration,
        };

        info!(
            "Recorder '{}' stopped: {} records, {} bytes in {:?}",
            self.name, summary.records_written, summary.bytes_written, summary.duration
        );
        Ok(summary)
    }

    /// Cumulative count plus throughput since the previous call
    pub fn get_info(&self) -> RunInfo {
        let info = self.metrics.sample();
        observability::publish_run_info(&self.name, &info);
        info
    }

    fn require(
        inner: &Inner<R>,
        command: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<()> {
        if allowed.contains(&inner.state) {
            Ok(())
        } else {
            warn!("Rejected '{}' in state {}", command, inner.state);
            Err(RecorderError::InvalidTransition {
                command,
                state: inner.state,
            })
        }
    }

    /// Spawn a consumer parked behind a new gate
    fn arm(&self, inner: &mut Inner<R>, source: Arc<RecordSource<R>>) -> Result<()> {
        let (gate, waiter) = start_gate();
        self.drain_budget.store(0, Ordering::Release);
        self.running.store(true, Ordering::Release);

        let consumer = Consumer {
            name: self.name.clone(),
            source: Arc::clone(&source),
            writer_slot: Arc::clone(&self.writer_slot),
            running: Arc::clone(&self.running),
            drain_budget: Arc::clone(&self.drain_budget),
            metrics: Arc::clone(&self.metrics),
            pop_timeout: self.settings.pop_timeout(),
        };

        let handle = std::thread::Builder::new()
            .name(format!("{}-{}", self.settings.thread_name_prefix, self.name))
            .spawn(move || consumer.run(waiter))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                RecorderError::ThreadFailed(format!("Failed to spawn consumer: {}", e))
            })?;

        debug!("Consumer for '{}' parked at start gate", self.name);

        inner.source = Some(source);
        inner.gate = Some(gate);
        inner.consumer = Some(handle);
        Ok(())
    }

    /// Clear the run flag, release a parked consumer and join it
    fn shutdown_consumer(&self, inner: &mut Inner<R>) -> ConsumerResult {
        let queued = inner.source.as_ref().map_or(0, |source| source.pending());
        self.drain_budget.store(queued, Ordering::Release);
        self.running.store(false, Ordering::Release);
        if let Some(mut gate) = inner.gate.take() {
            gate.abort();
        }

        match inner.consumer.take() {
            Some(handle) => handle.join().map_err(|_| {
                RecorderError::ThreadFailed(format!("consumer for '{}' panicked", self.name))
            })?,
            None => Ok(None),
        }
    }
}

impl<R: Record> Drop for Recorder<R> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.state.has_consumer() {
            if let Err(e) = self.shutdown_consumer(&mut inner) {
                warn!("Recorder '{}' teardown: {}", self.name, e);
            }
            inner.state = LifecycleState::Stopped;
        }
    }
}

/// Best-effort removal of a regular file left by an earlier run
fn remove_previous_output(path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed existing output file {}", path.display()),
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        },
        Ok(_) => debug!("{} is not a regular file, leaving it in place", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not inspect {}: {}", path.display(), e),
    }
}

/// Data-path state owned by the consumer thread
struct Consumer<R> {
    name: String,
    source: Arc<RecordSource<R>>,
    writer_slot: Arc<Mutex<Option<BufferedFileWriter>>>,
    running: Arc<AtomicBool>,
    drain_budget: Arc<AtomicUsize>,
    metrics: Arc<RunMetrics>,
    pop_timeout: Duration,
}

impl<R: Record> Consumer<R> {
    fn run(self, gate: GateWaiter) -> ConsumerResult {
        if gate.wait() == GateOutcome::Aborted {
            debug!("Consumer for '{}' released without start", self.name);
            return Ok(None);
        }

        let Some(mut writer) = self.writer_slot.lock().take() else {
            self.running.store(false, Ordering::Release);
            return Err(RecorderError::ThreadFailed(
                "started without an open writer".to_string(),
            ));
        };

        self.metrics.reset_window();
        debug!(
            "Consumer for '{}' draining queue '{}'",
            self.name,
            self.source.queue_name()
        );

        match self.consume(&mut writer) {
            Ok(()) => writer.close().map(Some),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!("Recorder '{}' run aborted: {}", self.name, e);
                if !writer.has_failed() {
                    if let Err(close_err) = writer.close() {
                        warn!("Closing output after failure: {}", close_err);
                    }
                }
                Err(e)
            }
        }
    }

    fn consume(&self, writer: &mut BufferedFileWriter) -> Result<()> {
        while self.running.load(Ordering::Acquire) {
            if let Some(record) = self.source.pop(self.pop_timeout)? {
                self.persist(writer, record)?;
            }
        }

        // Records already queued when stop was issued belong to this run
        let budget = self.drain_budget.swap(0, Ordering::AcqRel);
        if budget > 0 {
            debug!("Draining up to {} queued records after stop", budget);
        }
        for _ in 0..budget {
            match self.source.try_pop()? {
                Some(record) => self.persist(writer, record)?,
                None => break,
            }
        }

        Ok(())
    }

    #[inline]
    fn persist(&self, writer: &mut BufferedFileWriter, record: R) -> Result<()> {
        writer.write(record.as_bytes())?;
        self.metrics.record_processed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::record::FixedRecord;
    use crate::recording::record_queue::RecordQueue;
    use tempfile::tempdir;

    type Rec = FixedRecord<8>;

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            pop_timeout_ms: 20,
            ..Default::default()
        }
    }

    fn armed_recorder() -> (Recorder<Rec>, Arc<QueueRegistry<Rec>>) {
        let registry = Arc::new(QueueRegistry::new());
        registry.create("snb", 64);
        let recorder = Recorder::new("test", Arc::clone(&registry), settings());
        recorder.init("snb").unwrap();
        (recorder, registry)
    }

    #[test]
    fn test_new_recorder_is_uninitialized() {
        let registry = Arc::new(QueueRegistry::<Rec>::new());
        let recorder = Recorder::new("test", registry, settings());
        assert_eq!(recorder.state(), LifecycleState::Uninitialized);
        assert!(matches!(
            recorder.start(),
            Err(RecorderError::InvalidTransition { command: "start", .. })
        ));
    }

    #[test]
    fn test_init_unknown_queue_fails() {
        let registry = Arc::new(QueueRegistry::<Rec>::new());
        let recorder = Recorder::new("test", registry, settings());
        let err = recorder.init("missing").err().unwrap();
        assert!(matches!(err, RecorderError::ResourceBindFailed(_)));
        assert_eq!(recorder.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_init_rejects_spinning_consumer_settings() {
        let registry = Arc::new(QueueRegistry::<Rec>::new());
        registry.create("snb", 8);
        let settings = ConsumerSettings {
            pop_timeout_ms: 0,
            ..Default::default()
        };
        let recorder = Recorder::new("test", registry, settings);

        let err = recorder.init("snb").err().unwrap();
        assert!(matches!(err, RecorderError::InvalidConfig(_)));
        assert_eq!(recorder.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_double_init_rejected() {
        let (recorder, _registry) = armed_recorder();
        assert_eq!(recorder.state(), LifecycleState::ArmedWaitingStart);
        assert!(recorder.init("snb").is_err());
        assert_eq!(recorder.state(), LifecycleState::ArmedWaitingStart);
    }

    #[test]
    fn test_start_before_configure_rejected() {
        let (recorder, _registry) = armed_recorder();
        let err = recorder.start().err().unwrap();
        assert!(matches!(
            err,
            RecorderError::InvalidTransition {
                command: "start",
                state: LifecycleState::ArmedWaitingStart
            }
        ));
        assert_eq!(recorder.state(), LifecycleState::ArmedWaitingStart);
    }

    #[test]
    fn test_invalid_conf_leaves_state() {
        let (recorder, _registry) = armed_recorder();
        let dir = tempdir().unwrap();
        let conf = RecorderConf::new(dir.path().join("out.bin"), 0, CompressionAlgorithm::None);
        assert!(matches!(
            recorder.configure(conf),
            Err(RecorderError::InvalidConfig(_))
        ));
        assert_eq!(recorder.state(), LifecycleState::ArmedWaitingStart);
    }

    #[test]
    fn test_failed_open_allows_retry() {
        let (recorder, _registry) = armed_recorder();
        let dir = tempdir().unwrap();

        let bad = RecorderConf::new(
            dir.path().join("missing").join("out.bin"),
            64,
            CompressionAlgorithm::None,
        );
        assert!(matches!(
            recorder.configure(bad),
            Err(RecorderError::WriterOpenFailed(_))
        ));
        assert_eq!(recorder.state(), LifecycleState::ArmedWaitingStart);

        let good = RecorderConf::new(dir.path().join("out.bin"), 64, CompressionAlgorithm::None);
        recorder.configure(good).unwrap();
        assert_eq!(recorder.state(), LifecycleState::Configured);
    }

    #[test]
    fn test_double_start_rejected() {
        let (recorder, _registry) = armed_recorder();
        let dir = tempdir().unwrap();
        recorder
            .configure(RecorderConf::new(
                dir.path().join("out.bin"),
                64,
                CompressionAlgorithm::None,
            ))
            .unwrap();

        recorder.start().unwrap();
        assert!(matches!(
            recorder.start(),
            Err(RecorderError::InvalidTransition {
                state: LifecycleState::Running,
                ..
            })
        ));
        assert!(recorder.is_consuming());

        let summary = recorder.stop().unwrap();
        assert!(summary.started);
        assert_eq!(recorder.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_configure_while_running_rejected() {
        let (recorder, _registry) = armed_recorder();
        let dir = tempdir().unwrap();
        let conf = RecorderConf::new(dir.path().join("out.bin"), 64, CompressionAlgorithm::None);
        recorder.configure(conf.clone()).unwrap();
        recorder.start().unwrap();

        assert!(matches!(
            recorder.configure(conf),
            Err(RecorderError::InvalidTransition { command: "conf", .. })
        ));
        recorder.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start_does_not_hang() {
        let (recorder, _registry) = armed_recorder();
        let summary = recorder.stop().unwrap();
        assert!(!summary.started);
        assert!(summary.output_file.is_none());
        assert_eq!(recorder.state(), LifecycleState::Stopped);

        // A second stop is rejected, not a deadlock
        assert!(matches!(
            recorder.stop(),
            Err(RecorderError::InvalidTransition { command: "stop", .. })
        ));
    }

    #[test]
    fn test_stop_configured_closes_empty_file() {
        let (recorder, _registry) = armed_recorder();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        recorder
            .configure(RecorderConf::new(&path, 64, CompressionAlgorithm::None))
            .unwrap();

        let summary = recorder.stop().unwrap();
        assert!(!summary.started);
        assert_eq!(summary.output_file.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_drop_releases_parked_consumer() {
        let (recorder, _registry) = armed_recorder();
        let started = Instant::now();
        drop(recorder);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_post_stop_drain_takes_only_counted_records() {
        let queue = RecordQueue::<Rec>::new("snb", 16);
        let producer = queue.producer();
        for i in 0..10u8 {
            producer.push(Rec::filled(i)).unwrap();
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut writer =
            BufferedFileWriter::open(&path, 64, CompressionAlgorithm::None, CompressionLevel::Fast)
                .unwrap();

        // Stop already issued with three records queued at the time
        let consumer = Consumer {
            name: "test".to_string(),
            source: Arc::new(RecordSource::new("snb", queue.consumer())),
            writer_slot: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            drain_budget: Arc::new(AtomicUsize::new(3)),
            metrics: Arc::new(RunMetrics::new()),
            pop_timeout: Duration::from_millis(10),
        };
        consumer.consume(&mut writer).unwrap();
        writer.close().unwrap();

        assert_eq!(consumer.metrics.total_processed(), 3);
        assert_eq!(consumer.source.pending(), 7);
        assert_eq!(std::fs::read(&path).unwrap().len(), 3 * Rec::SIZE);
    }
}
