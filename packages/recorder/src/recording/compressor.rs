// packages/recorder/src/recording/compressor.rs
//! Compression codecs for recorded data
//!
//! The streaming path lives in the buffered writer; this module owns the codec
//! selection and the whole-buffer decode used when reading recordings back.

use crate::utils::errors::{RecorderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Codec applied to the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Raw passthrough
    #[default]
    #[serde(alias = "None", alias = "NONE")]
    None,

    /// zstd frame
    #[serde(alias = "Zstd", alias = "ZSTD")]
    Zstd,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::None => write!(f, "none"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
        }
    }
}

/// Compression levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    #[default]
    Fast,

    /// Balanced (level 3)
    Balanced,

    /// Best compression (level 19)
    Best,
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
        }
    }
}

/// Decode a whole recording payload
pub fn decompress(algorithm: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zstd => {
            let payload = zstd::decode_all(data).map_err(|e| {
                RecorderError::CompressionFailed(format!("Decompression error: {}", e))
            })?;
            debug!("Decompressed {} bytes -> {} bytes", data.len(), payload.len());
            Ok(payload)
        }
    }
}
