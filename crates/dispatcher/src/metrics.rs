//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::RecordOutcome;

/// Outcome counters shared by all workers and the transport worker
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Current transport queue length
    queue_len: AtomicUsize,
    dispatched: AtomicU64,
    skipped: AtomicU64,
    temporary_failures: AtomicU64,
    permanent_failures: AtomicU64,
    /// Batch formatter invocations
    batches: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Count one record outcome
    pub fn record(&self, outcome: RecordOutcome) {
        let counter = match outcome {
            RecordOutcome::Dispatched => &self.dispatched,
            RecordOutcome::Skipped => &self.skipped,
            RecordOutcome::TemporaryFailure => &self.temporary_failures,
            RecordOutcome::PermanentFailure => &self.permanent_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn temporary_failures(&self) -> u64 {
        self.temporary_failures.load(Ordering::Relaxed)
    }

    pub fn permanent_failures(&self) -> u64 {
        self.permanent_failures.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            dispatched: self.dispatched(),
            skipped: self.skipped(),
            temporary_failures: self.temporary_failures(),
            permanent_failures: self.permanent_failures(),
            batches: self.batches(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub dispatched: u64,
    pub skipped: u64,
    pub temporary_failures: u64,
    pub permanent_failures: u64,
    pub batches: u64,
}

impl MetricsSnapshot {
    /// Records that reached a final outcome
    pub fn settled(&self) -> u64 {
        self.dispatched + self.skipped + self.temporary_failures + self.permanent_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let metrics = DispatchMetrics::new();
        metrics.record(RecordOutcome::Dispatched);
        metrics.record(RecordOutcome::Dispatched);
        metrics.record(RecordOutcome::PermanentFailure);
        metrics.inc_batches();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(snapshot.permanent_failures, 1);
        assert_eq!(snapshot.batches, 1);
        assert_eq!(snapshot.settled(), 3);
    }
}
