use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Best-effort dispatch counters.
///
/// Counters are relaxed atomics: approximate under high concurrency, never
/// blocking the hot path. `queued` tracks jobs waiting for admission and
/// decrements (saturating) when a job leaves the queue; the other counters
/// are monotonic.
#[derive(Debug, Default)]
pub struct Metrics {
    queued: AtomicU64,
    processed: AtomicU64,
    retries: AtomicU64,
}

impl Metrics {
    pub fn job_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_dequeued(&self) {
        let _ = self
            .queued
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn job_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view for operators. Eventually consistent.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queued: u64,
    pub processed: u64,
    pub retries: u64,
}
