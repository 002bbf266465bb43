// packages/recorder/src/recording/metrics.rs
//! Processed-record counters and throughput sampling
//!
//! The consumer thread is the only writer of the counters. Telemetry readers
//! take the per-sample count with an atomic swap, so a record counted between
//! two samples is reported in exactly one of them.

use chrono::{DateTime, Utc};
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Samples closer together than this report zero throughput and leave the
/// pending count for the next sample
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Telemetry snapshot returned by `get_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Records processed since the recorder was created
    pub packets_processed: u64,

    /// Records per second since the previous sample
    pub throughput_processed_packets: f64,

    pub sampled_at: DateTime<Utc>,
}

/// Run counters shared between the consumer and telemetry
#[derive(Debug)]
pub struct RunMetrics {
    total_processed: CachePadded<AtomicU64>,
    since_last_sample: CachePadded<AtomicU64>,
    last_sample: Mutex<Instant>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            total_processed: CachePadded::new(AtomicU64::new(0)),
            since_last_sample: CachePadded::new(AtomicU64::new(0)),
            last_sample: Mutex::new(Instant::now()),
        }
    }

    /// Count one record; consumer thread only
    #[inline]
    pub fn record_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        self.since_last_sample.fetch_add(1, Ordering::Release);
    }

    /// Restart the throughput window, e.g. when a run begins
    pub fn reset_window(&self) {
        let mut last = self.last_sample.lock();
        self.since_last_sample.store(0, Ordering::Release);
        *last = Instant::now();
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Acquire)
    }

    /// Read the counters and compute throughput since the previous sample
    pub fn sample(&self) -> RunInfo {
        let mut last = self.last_sample.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(*last);

        let throughput = if elapsed < MIN_SAMPLE_INTERVAL {
            0.0
        } else {
            let processed = self.since_last_sample.swap(0, Ordering::AcqRel);
            *last = now;
            processed as f64 / elapsed.as_secs_f64()
        };

        RunInfo {
            packets_processed: self.total_processed(),
            throughput_processed_packets: throughput,
            sampled_at: Utc::now(),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
