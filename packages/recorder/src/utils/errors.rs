// packages/recorder/src/utils/errors.rs
//! Error types for the recorder
//!
//! Every failure the host can observe is a [`RecorderError`]. Source timeouts
//! are not errors and never appear here; they are absorbed by the consumer loop.

use crate::recording::lifecycle::LifecycleState;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The named input queue could not be resolved at init
    #[error("Cannot bind input queue: {0}")]
    ResourceBindFailed(String),

    /// A lifecycle command was issued in a state that does not accept it
    #[error("Command '{command}' not allowed in state {state}")]
    InvalidTransition {
        command: &'static str,
        state: LifecycleState,
    },

    /// The output file could not be prepared at configure
    #[error("Cannot open output writer: {0}")]
    WriterOpenFailed(String),

    /// The writer failed mid-run; `records_written` records reached the writer
    /// before the failure
    #[error("Write to {} failed after {records_written} records: {reason}", .path.display())]
    WriteFailed {
        path: PathBuf,
        records_written: u64,
        reason: String,
    },

    /// The input queue is no longer usable
    #[error("Input queue fault: {0}")]
    SourceFault(String),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Invalid recorder configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Spawning or joining the consumer thread failed
    #[error("Consumer thread failure: {0}")]
    ThreadFailed(String),

    #[error("Settings error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RecorderError {
    /// Whether the error ended a recording session (as opposed to a rejected
    /// command that left state untouched)
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            RecorderError::WriteFailed { .. }
                | RecorderError::SourceFault(_)
                | RecorderError::ThreadFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_message_names_state() {
        let err = RecorderError::InvalidTransition {
            command: "start",
            state: LifecycleState::ArmedWaitingStart,
        };
        assert_eq!(
            err.to_string(),
            "Command 'start' not allowed in state ArmedWaitingStart"
        );
        assert!(!err.is_fatal_to_run());
    }

    #[test]
    fn test_write_failure_reports_progress() {
        let err = RecorderError::WriteFailed {
            path: PathBuf::from("/data/run.bin"),
            records_written: 42,
            reason: "No space left on device".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42 records"));
        assert!(msg.contains("/data/run.bin"));
        assert!(err.is_fatal_to_run());
    }
}
