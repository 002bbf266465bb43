// packages/recorder/src/recording/source.rs
//! Record source adapter
//!
//! Pull interface over the consumer end of a bounded queue. A timeout is the
//! normal idle case and comes back as `Ok(None)`; only a torn-down queue is an
//! error.

use crate::recording::record_queue::RecordConsumer;
use crate::utils::errors::{RecorderError, Result};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Bound source of records for the consumer thread
pub struct RecordSource<R> {
    queue_name: String,
    consumer: RecordConsumer<R>,
}

impl<R> RecordSource<R> {
    pub fn new(queue_name: impl Into<String>, consumer: RecordConsumer<R>) -> Self {
        Self {
            queue_name: queue_name.into(),
            consumer,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Wait up to `timeout` for the next record
    pub fn pop(&self, timeout: Duration) -> Result<Option<R>> {
        match self.consumer.receiver().recv_timeout(timeout) {
            Ok(record) => {
                self.consumer.note_pop();
                Ok(Some(record))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Take the next record without waiting
    pub fn try_pop(&self) -> Result<Option<R>> {
        match self.consumer.receiver().try_recv() {
            Ok(record) => {
                self.consumer.note_pop();
                Ok(Some(record))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Records currently waiting in the queue
    pub fn pending(&self) -> usize {
        self.consumer.receiver().len()
    }

    fn disconnected(&self) -> RecorderError {
        RecorderError::SourceFault(format!("queue '{}' disconnected", self.queue_name))
    }
}
