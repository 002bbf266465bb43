// packages/recorder/src/recording/record_queue.rs
//! Bounded record queues and the named queue registry
//!
//! Upstream readout pushes records into a bounded queue; the recorder pops from
//! the other end. Queues are created under a name in a [`QueueRegistry`] so that
//! `init` can bind to them by name.

use crate::utils::errors::{RecorderError, Result};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shared queue counters
#[derive(Debug, Default)]
struct QueueCounters {
    push_count: AtomicU64,
    pop_count: AtomicU64,
    timeout_count: AtomicU64,
}

/// Bounded FIFO queue of records
pub struct RecordQueue<R> {
    name: String,
    sender: Sender<R>,
    receiver: Receiver<R>,
    counters: Arc<QueueCounters>,
}

impl<R: Send + 'static> RecordQueue<R> {
    /// Create a new bounded queue
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            name: name.into(),
            sender,
            receiver,
            counters: Arc::new(QueueCounters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Producer handle
    pub fn producer(&self) -> RecordProducer<R> {
        RecordProducer {
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Consumer handle
    pub fn consumer(&self) -> RecordConsumer<R> {
        RecordConsumer {
            receiver: self.receiver.clone(),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            push_count: self.counters.push_count.load(Ordering::Relaxed),
            pop_count: self.counters.pop_count.load(Ordering::Relaxed),
            timeout_count: self.counters.timeout_count.load(Ordering::Relaxed),
            current_size: self.receiver.len(),
            capacity: self.receiver.capacity().unwrap_or(0),
        }
    }
}

/// Producer side of a [`RecordQueue`]
pub struct RecordProducer<R> {
    sender: Sender<R>,
    counters: Arc<QueueCounters>,
}

impl<R> Clone for RecordProducer<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<R> RecordProducer<R> {
    /// Push a record, blocking while the queue is full
    pub fn push(&self, record: R) -> std::result::Result<(), R> {
        match self.sender.send(record) {
            Ok(()) => {
                self.counters.push_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => Err(err.into_inner()),
        }
    }

    /// Push a record, giving up (and returning it) after `timeout`
    pub fn push_timeout(&self, record: R, timeout: Duration) -> std::result::Result<(), R> {
        match self.sender.send_timeout(record, timeout) {
            Ok(()) => {
                self.counters.push_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(record)) => {
                self.counters.timeout_count.fetch_add(1, Ordering::Relaxed);
                Err(record)
            }
            Err(SendTimeoutError::Disconnected(record)) => Err(record),
        }
    }
}

/// Consumer side of a [`RecordQueue`]
pub struct RecordConsumer<R> {
    receiver: Receiver<R>,
    counters: Arc<QueueCounters>,
}

impl<R> RecordConsumer<R> {
    pub(crate) fn receiver(&self) -> &Receiver<R> {
        &self.receiver
    }

    pub(crate) fn note_pop(&self) {
        self.counters.pop_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Queue statistics
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Total records pushed
    pub push_count: u64,

    /// Total records popped
    pub pop_count: u64,

    /// Pushes that gave up on a full queue
    pub timeout_count: u64,

    /// Current queue size
    pub current_size: usize,

    /// Queue capacity
    pub capacity: usize,
}

impl QueueStats {
    /// Calculate fill percentage
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.current_size as f64 / self.capacity as f64) * 100.0
        }
    }
}

/// Named queues available for binding
pub struct QueueRegistry<R> {
    queues: DashMap<String, Arc<RecordQueue<R>>>,
}

impl<R: Send + 'static> QueueRegistry<R> {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Create (or return the existing) queue registered under `name`
    pub fn create(&self, name: &str, capacity: usize) -> Arc<RecordQueue<R>> {
        let queue = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Registering queue '{}' with capacity {}", name, capacity);
                Arc::new(RecordQueue::new(name, capacity))
            });
        Arc::clone(queue.value())
    }

    /// Look up a queue by name
    pub fn resolve(&self, name: &str) -> Result<Arc<RecordQueue<R>>> {
        match self.queues.get(name) {
            Some(queue) => Ok(Arc::clone(queue.value())),
            None => {
                warn!("Queue '{}' is not registered", name);
                Err(RecorderError::ResourceBindFailed(format!(
                    "no queue named '{}'",
                    name
                )))
            }
        }
    }

    /// Remove a queue; existing producer and consumer handles stay valid
    pub fn remove(&self, name: &str) -> Option<Arc<RecordQueue<R>>> {
        self.queues.remove(name).map(|(_, queue)| queue)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl<R: Send + 'static> Default for QueueRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}
