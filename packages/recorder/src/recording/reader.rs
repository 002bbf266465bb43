// packages/recorder/src/recording/reader.rs
//! Read recordings back as records
//!
//! A recording is the concatenation of fixed-size records, wrapped in a zstd
//! frame when compressed. There is no header, so the caller states the codec
//! and the record size.

use crate::recording::compressor::{self, CompressionAlgorithm};
use crate::utils::errors::{RecorderError, Result};
use std::path::Path;
use tracing::debug;

/// Decoded recording
#[derive(Debug, Clone)]
pub struct Recording {
    payload: Vec<u8>,
    record_size: usize,
}

impl Recording {
    /// Read and decode a recording file
    pub fn open<P: AsRef<Path>>(
        path: P,
        compression: CompressionAlgorithm,
        record_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        if record_size == 0 {
            return Err(RecorderError::InvalidArguments(
                "record size must be greater than 0".to_string(),
            ));
        }

        let raw = std::fs::read(path).map_err(|e| {
            RecorderError::InvalidArguments(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let payload = compressor::decompress(compression, &raw)?;

        if payload.len() % record_size != 0 {
            return Err(RecorderError::InvalidArguments(format!(
                "{} holds {} bytes, not a multiple of the {}-byte record size",
                path.display(),
                payload.len(),
                record_size
            )));
        }

        debug!(
            "Read {} ({} bytes on disk, {} records)",
            path.display(),
            raw.len(),
            payload.len() / record_size
        );

        Ok(Self {
            payload,
            record_size,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.payload.len() / self.record_size
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decoded size in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Iterate over record payloads in file order
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.payload.chunks_exact(self.record_size)
    }
}
