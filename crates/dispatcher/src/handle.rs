//! TransportHandle - manages a transport with isolated queue and worker task

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DestinationTransport, OutboundRecord, OutboundRoute, RecordOutcome};

use crate::ack::{AckSender, Acknowledger};

/// One dispatch unit: the records of one record or one batch
#[derive(Debug)]
pub struct Delivery {
    pub route: OutboundRoute,
    pub records: Vec<OutboundRecord>,
    /// Settled together with the transport result
    pub acks: Vec<Option<AckSender>>,
}

/// Handle to a running transport worker
pub struct TransportHandle {
    /// Transport name
    name: String,
    /// Channel to send deliveries to worker
    tx: mpsc::Sender<Delivery>,
    acknowledger: Acknowledger,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl TransportHandle {
    /// Create a new TransportHandle and spawn the worker task
    pub fn spawn<T: DestinationTransport + Send + 'static>(
        transport: T,
        queue_capacity: usize,
        acknowledger: Acknowledger,
    ) -> Self {
        let name = transport.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));

        let worker_ack = acknowledger.clone();
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            transport_worker(transport, rx, worker_ack, worker_name).await;
        });

        Self {
            name,
            tx,
            acknowledger,
            worker_handle,
        }
    }

    /// Get transport name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acknowledger(&self) -> &Acknowledger {
        &self.acknowledger
    }

    /// Enqueue a delivery (non-blocking)
    ///
    /// A full or closed queue settles the delivery as a temporary failure so
    /// the records are redelivered instead of dropped.
    pub fn try_send(&self, delivery: Delivery) -> bool {
        match self.tx.try_send(delivery) {
            Ok(()) => {
                let queued = self.tx.max_capacity() - self.tx.capacity();
                self.acknowledger.metrics().set_queue_len(queued);
                observability::record_queue_depth(&self.name, queued);
                true
            }
            Err(mpsc::error::TrySendError::Full(d)) => {
                warn!(
                    transport = %self.name,
                    route = %d.route,
                    records = d.acks.len(),
                    "Queue full, delivery failed temporarily"
                );
                self.acknowledger
                    .settle_all(d.acks, RecordOutcome::TemporaryFailure);
                false
            }
            Err(mpsc::error::TrySendError::Closed(d)) => {
                error!(transport = %self.name, "Transport worker closed unexpectedly");
                self.acknowledger
                    .settle_all(d.acks, RecordOutcome::TemporaryFailure);
                false
            }
        }
    }

    /// Shutdown the transport worker gracefully
    #[instrument(name = "transport_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(transport = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(transport = %self.name, "TransportHandle shutdown complete");
    }
}

/// Worker task that hands deliveries to the transport and settles them
#[instrument(
    name = "transport_worker_loop",
    skip(transport, rx, acknowledger),
    fields(transport = %name)
)]
async fn transport_worker<T: DestinationTransport>(
    mut transport: T,
    mut rx: mpsc::Receiver<Delivery>,
    acknowledger: Acknowledger,
    name: String,
) {
    debug!(transport = %name, "Transport worker started");

    while let Some(delivery) = rx.recv().await {
        acknowledger.metrics().set_queue_len(rx.len());

        let started = Instant::now();
        let result = transport.send(&delivery.route, &delivery.records).await;
        observability::record_transport_latency_ms(&name, started.elapsed().as_secs_f64() * 1000.0);

        let outcome = match result {
            Ok(()) => RecordOutcome::Dispatched,
            Err(e) if e.is_ignored_by(&delivery.records) => {
                warn!(
                    transport = %name,
                    route = %delivery.route,
                    code = %e.code,
                    "Send failed with ignorable error, dropping"
                );
                RecordOutcome::PermanentFailure
            }
            Err(e) => {
                error!(
                    transport = %name,
                    route = %delivery.route,
                    error = %e,
                    "Send failed"
                );
                RecordOutcome::TemporaryFailure
            }
        };
        acknowledger.settle_all(delivery.acks, outcome);
    }

    if let Err(e) = transport.flush().await {
        error!(transport = %name, error = %e, "Flush failed during shutdown");
    }
    if let Err(e) = transport.close().await {
        error!(transport = %name, error = %e, "Close failed during shutdown");
    }

    debug!(transport = %name, "Transport worker stopped");
}
