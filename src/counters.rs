//! In-process cycle counters for the two unit loops.
//!
//! Counters are plain relaxed atomics behind `Arc` so a snapshot can be
//! taken from outside the loop (tests, a future status surface) while the
//! loop keeps running. There is no export surface; these stay in-process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::publish::PublishResult;

/// Counters kept by the onboard tracker loop.
#[derive(Clone, Default)]
pub struct TrackerCounters {
    cycles: Arc<AtomicU64>,
    frames_sent: Arc<AtomicU64>,
    lookups_failed: Arc<AtomicU64>,
    publish_failures: Arc<AtomicU64>,
}

/// Point-in-time copy of [`TrackerCounters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStats {
    pub cycles: u64,
    pub frames_sent: u64,
    pub lookups_failed: u64,
    pub publish_failures: u64,
}

impl TrackerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failed(&self) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failure per sink that did not accept the publish.
    pub fn record_publish(&self, result: &PublishResult) {
        self.publish_failures
            .fetch_add(result.failed_sinks(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Counters kept by the roadside receiver loop.
#[derive(Clone, Default)]
pub struct ReceiverCounters {
    cycles: Arc<AtomicU64>,
    frames_accepted: Arc<AtomicU64>,
    frames_rejected: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    publish_failures: Arc<AtomicU64>,
    cycle_errors: Arc<AtomicU64>,
}

/// Point-in-time copy of [`ReceiverCounters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverStats {
    pub cycles: u64,
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub evictions: u64,
    pub publish_failures: u64,
    pub cycle_errors: u64,
}

impl ReceiverCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_accepted(&self) {
        self.frames_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_publish(&self, result: &PublishResult) {
        self.publish_failures
            .fetch_add(result.failed_sinks(), Ordering::Relaxed);
    }

    pub fn record_cycle_error(&self) {
        self.cycle_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
        }
    }
}
