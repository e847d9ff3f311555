//! Acknowledgment plumbing
//!
//! Every record is settled exactly once: the outcome is counted and, when
//! the producer asked for it, sent back on its oneshot channel.

use std::sync::Arc;

use contracts::RecordOutcome;
use tokio::sync::oneshot;
use tracing::trace;

use crate::metrics::DispatchMetrics;

/// Per-record acknowledgment channel
pub type AckSender = oneshot::Sender<RecordOutcome>;

/// Settles record outcomes
#[derive(Debug, Clone)]
pub struct Acknowledger {
    destination: &'static str,
    metrics: Arc<DispatchMetrics>,
}

impl Acknowledger {
    pub fn new(destination: &'static str, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            destination,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Settle one record
    pub fn settle(&self, ack: Option<AckSender>, outcome: RecordOutcome) {
        self.metrics.record(outcome);
        observability::record_outcome(self.destination, outcome);
        if let Some(tx) = ack {
            // Receiver may have stopped waiting
            if tx.send(outcome).is_err() {
                trace!(outcome = %outcome, "acknowledgment receiver dropped");
            }
        }
    }

    /// Apply one outcome to every member of a dispatch unit
    pub fn settle_all(&self, acks: Vec<Option<AckSender>>, outcome: RecordOutcome) {
        for ack in acks {
            self.settle(ack, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settle_all_sends_same_outcome() {
        let ack = Acknowledger::new("kafka", Arc::new(DispatchMetrics::new()));
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();

        ack.settle_all(
            vec![Some(tx1), Some(tx2), None],
            RecordOutcome::TemporaryFailure,
        );

        assert_eq!(rx1.await.unwrap(), RecordOutcome::TemporaryFailure);
        assert_eq!(rx2.await.unwrap(), RecordOutcome::TemporaryFailure);
        assert_eq!(ack.metrics().temporary_failures(), 3);
    }
}
