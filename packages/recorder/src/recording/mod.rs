// packages/recorder/src/recording/mod.rs
//! Record capture and persistence
//!
//! - **Record**: opaque fixed-size payloads
//! - **Record Queue**: bounded blocking queues, registered by name
//! - **Source**: bounded-wait pull adapter over a queue
//! - **Buffered Writer**: in-memory buffer flushed to a raw or zstd file
//! - **Metrics**: processed counters and throughput sampling
//! - **Lifecycle**: states and the pre-start gate
//! - **Recorder**: lifecycle controller and its consumer thread
//! - **Commands**: name → handler table driving the recorder
//! - **Reader**: decode a finished recording
//!
//! # Architecture
//!
//! ```text
//! Readout ─► RecordQueue (bounded) ─► RecordSource::pop(100ms)
//!                                            │ consumer thread
//!                                            ▼
//!                                  BufferedFileWriter ─► file (raw | zstd)
//!                                            │
//!                                        RunMetrics ◄── get_info()
//! ```

pub mod buffered_writer;
pub mod commands;
pub mod compressor;
pub mod lifecycle;
pub mod metrics;
pub mod reader;
pub mod record;
pub mod record_queue;
pub mod recorder;
pub mod source;

// Re-export commonly used types
pub use buffered_writer::{BufferedFileWriter, WriterSummary};
pub use commands::{CommandTable, InitArgs};
pub use compressor::{CompressionAlgorithm, CompressionLevel};
pub use lifecycle::LifecycleState;
pub use self::metrics::{RunInfo, RunMetrics};
pub use reader::Recording;
pub use record::{FixedRecord, Record, SuperChunk, SUPERCHUNK_SIZE};
pub use record_queue::{QueueRegistry, QueueStats, RecordProducer, RecordQueue};
pub use recorder::{Recorder, RecorderConf, RunSummary};
pub use source::RecordSource;
