// packages/recorder/src/recording/buffered_writer.rs
//! Buffered, optionally compressing file writer
//!
//! Records are appended to an in-memory buffer of `buffer_size` bytes. When the
//! buffer fills it is handed to the sink (raw file or zstd encoder) and the sink
//! is flushed through to the file. `close` drains the remaining partial buffer,
//! finishes the codec frame and syncs the file, so nothing accepted by `write`
//! is lost on a clean stop.
//!
//! A failed drain poisons the writer. Only records from drains that reached the
//! file are reported as written, and a raw file is cut back to that length so
//! no torn record is left behind.

use crate::recording::compressor::{CompressionAlgorithm, CompressionLevel};
use crate::utils::errors::{RecorderError, Result};
use bytes::BytesMut;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

enum Sink {
    Raw(File),
    Zstd(zstd::stream::write::Encoder<'static, File>),
}

impl Sink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Sink::Raw(file) => file.write_all(data),
            Sink::Zstd(encoder) => encoder.write_all(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Raw(file) => file.flush(),
            Sink::Zstd(encoder) => encoder.flush(),
        }
    }

    /// Cut a raw file back to `len` bytes. Compressed output and non-regular
    /// files are left as they are.
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        match self {
            Sink::Raw(file) if file.metadata()?.is_file() => file.set_len(len),
            _ => Ok(()),
        }
    }

    fn finish(self) -> io::Result<File> {
        match self {
            Sink::Raw(file) => Ok(file),
            Sink::Zstd(encoder) => encoder.finish(),
        }
    }
}

/// Totals for a closed (or in-progress) output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSummary {
    pub path: PathBuf,

    /// Records accepted by `write`
    pub records_written: u64,

    /// Payload bytes accepted by `write`, before compression
    pub bytes_written: u64,

    pub compression: CompressionAlgorithm,
}

/// Buffered output file for one recording session
pub struct BufferedFileWriter {
    path: PathBuf,
    compression: CompressionAlgorithm,
    buffer: BytesMut,
    buffer_size: usize,
    sink: Option<Sink>,

    /// Records and bytes accepted so far
    records_written: u64,
    bytes_written: u64,

    /// Records and payload bytes whose drain was flushed to the file
    records_persisted: u64,
    bytes_persisted: u64,
    pending_records: u64,

    /// Reason of the first failed drain; the writer accepts nothing after it
    failure: Option<String>,
}

impl BufferedFileWriter {
    /// Create (or truncate) `path` and prepare the buffer and codec
    pub fn open<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
        compression: CompressionAlgorithm,
        level: CompressionLevel,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if buffer_size == 0 {
            return Err(RecorderError::WriterOpenFailed(
                "stream buffer size must be greater than 0".to_string(),
            ));
        }

        let file = File::create(&path).map_err(|e| {
            RecorderError::WriterOpenFailed(format!("Failed to create {}: {}", path.display(), e))
        })?;

        let sink = match compression {
            CompressionAlgorithm::None => Sink::Raw(file),
            CompressionAlgorithm::Zstd => {
                let encoder =
                    zstd::stream::write::Encoder::new(file, level.as_i32()).map_err(|e| {
                        RecorderError::WriterOpenFailed(format!(
                            "Failed to initialize zstd encoder: {}",
                            e
                        ))
                    })?;
                Sink::Zstd(encoder)
            }
        };

        info!(
            "Opened {} (buffer {} bytes, compression {})",
            path.display(),
            buffer_size,
            compression
        );

        Ok(Self {
            path,
            compression,
            buffer: BytesMut::with_capacity(buffer_size),
            buffer_size,
            sink: Some(sink),
            records_written: 0,
            bytes_written: 0,
            records_persisted: 0,
            bytes_persisted: 0,
            pending_records: 0,
            failure: None,
        })
    }

    /// Append one record
    pub fn write(&mut self, record: &[u8]) -> Result<()> {
        self.check_usable()?;

        self.buffer.extend_from_slice(record);
        self.records_written += 1;
        self.bytes_written += record.len() as u64;
        self.pending_records += 1;

        if self.buffer.len() >= self.buffer_size {
            self.drain_buffer()?;
        }

        Ok(())
    }

    /// Push buffered bytes through the codec and flush the file
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable()?;
        self.drain_buffer()?;

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                return Err(self.fail(format!("flush failed: {}", e)));
            }
        }

        Ok(())
    }

    /// Flush, finish the codec frame and sync the file to disk.
    ///
    /// Closing an already closed writer is a no-op. Closing a failed writer
    /// releases the file without finishing the codec frame and returns the
    /// original failure.
    pub fn close(&mut self) -> Result<WriterSummary> {
        if self.sink.is_none() {
            return Ok(self.summary());
        }
        if let Some(reason) = self.failure.clone() {
            self.sink = None;
            return Err(self.write_error(reason));
        }

        self.flush()?;

        if let Some(sink) = self.sink.take() {
            let file = sink
                .finish()
                .map_err(|e| self.write_error(format!("finishing stream failed: {}", e)))?;
            file.sync_all()
                .map_err(|e| self.write_error(format!("sync failed: {}", e)))?;
        }

        let summary = self.summary();
        info!(
            "Closed {}: {} records, {} bytes before compression",
            summary.path.display(),
            summary.records_written,
            summary.bytes_written
        );
        Ok(summary)
    }

    fn drain_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let Some(sink) = self.sink.as_mut() else {
            return Err(self.write_error("writer is closed".to_string()));
        };

        // Count nothing until the codec has pushed the bytes into the file
        let drained = sink.write_all(&self.buffer).and_then(|()| sink.flush());
        if let Err(e) = drained {
            return Err(self.fail(e.to_string()));
        }

        debug!(
            "Drained {} bytes ({} records) to {}",
            self.buffer.len(),
            self.pending_records,
            self.path.display()
        );

        self.bytes_persisted += self.buffer.len() as u64;
        self.buffer.clear();
        self.records_persisted += self.pending_records;
        self.pending_records = 0;
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if self.sink.is_none() {
            return Err(self.write_error("writer is closed".to_string()));
        }
        if let Some(reason) = &self.failure {
            return Err(self.write_error(format!("writer failed earlier: {}", reason)));
        }
        Ok(())
    }

    /// Poison the writer and drop the records that never reached the file
    fn fail(&mut self, reason: String) -> RecorderError {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.truncate(self.bytes_persisted) {
                warn!(
                    "Could not cut {} back to {} bytes: {}",
                    self.path.display(),
                    self.bytes_persisted,
                    e
                );
            }
        }
        warn!(
            "Write to {} failed, {} records written: {}",
            self.path.display(),
            self.records_persisted,
            reason
        );
        self.buffer.clear();
        self.pending_records = 0;
        self.failure = Some(reason.clone());
        self.write_error(reason)
    }

    fn write_error(&self, reason: String) -> RecorderError {
        RecorderError::WriteFailed {
            path: self.path.clone(),
            records_written: self.records_persisted,
            reason,
        }
    }

    pub fn summary(&self) -> WriterSummary {
        WriterSummary {
            path: self.path.clone(),
            records_written: self.records_written,
            bytes_written: self.bytes_written,
            compression: self.compression,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently held in memory
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        if self.sink.is_some() && self.failure.is_none() {
            if let Err(e) = self.close() {
                warn!("Closing {} on drop failed: {}", self.path.display(), e);
            }
        }
    }
}
