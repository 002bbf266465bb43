// packages/recorder/src/lib.rs
//! Readout Data Recorder
//!
//! Drains fixed-size records from a bounded readout queue on a dedicated
//! thread and persists them to a single output file, optionally zstd
//! compressed, under host-driven `init` / `conf` / `start` / `stop` control.
//!
//! # Example
//!
//! ```no_run
//! use readout_recorder::recording::{
//!     CompressionAlgorithm, QueueRegistry, Recorder, RecorderConf, SuperChunk,
//! };
//! use readout_recorder::utils::RecorderSettings;
//! use readout_recorder::RecorderError;
//! use std::sync::Arc;
//!
//! # fn main() -> readout_recorder::Result<()> {
//! let settings = RecorderSettings::load()?;
//! let registry = Arc::new(QueueRegistry::<SuperChunk>::new());
//! let producer = registry.create("snb", settings.queue.capacity).producer();
//!
//! let recorder = Recorder::new("datarecorder", Arc::clone(&registry), settings.consumer);
//! recorder.init("snb")?;
//! recorder.configure(RecorderConf::new("run.bin", 8_388_608, CompressionAlgorithm::Zstd))?;
//! recorder.start()?;
//!
//! producer
//!     .push(SuperChunk::filled(0))
//!     .map_err(|_| RecorderError::SourceFault("input queue closed".to_string()))?;
//! println!("{:?}", recorder.get_info());
//!
//! let summary = recorder.stop()?;
//! println!("{} records written", summary.records_written);
//! # Ok(())
//! # }
//! ```

pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use recording::recorder::{Recorder, RecorderConf, RunSummary};
pub use utils::config::RecorderSettings;
pub use utils::errors::{RecorderError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
