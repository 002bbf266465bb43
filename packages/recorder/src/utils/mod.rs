// packages/recorder/src/utils/mod.rs
//! Shared utilities: error types and process-level settings

pub mod config;
pub mod errors;

pub use self::config::{ConsumerSettings, LoggingSettings, QueueSettings, RecorderSettings};
pub use self::errors::{RecorderError, Result};
