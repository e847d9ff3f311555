//! Dispatcher - worker pool running records through the pipeline

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument};

use contracts::{
    ChangeNotificationRecord, DestinationTransport, PipelineBlueprint, RecordOutcome,
};

use crate::ack::{AckSender, Acknowledger};
use crate::batcher::{Batch, Batcher};
use crate::error::DispatcherError;
use crate::handle::{Delivery, TransportHandle};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::pipeline::{Disposition, Pipeline, Prepared};
use crate::registry::Registry;

/// One change notification plus its optional acknowledgment channel
#[derive(Debug)]
pub struct Notification {
    pub record: ChangeNotificationRecord,
    pub ack: Option<AckSender>,
}

impl Notification {
    /// Notification whose outcome is reported on the returned receiver
    pub fn with_ack(
        record: ChangeNotificationRecord,
    ) -> (Self, oneshot::Receiver<RecordOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                record,
                ack: Some(tx),
            },
            rx,
        )
    }

    /// Notification nobody waits on; the outcome is only counted
    pub fn unacknowledged(record: ChangeNotificationRecord) -> Self {
        Self { record, ack: None }
    }
}

/// Batch accumulation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub max_size: usize,
    pub linger: Duration,
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Concurrent pipeline workers
    pub workers: usize,
    /// Transport queue capacity
    pub queue_capacity: usize,
    /// Batch formatting; `None` dispatches record by record
    pub batch: Option<BatchSettings>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            batch: None,
        }
    }
}

impl DispatcherConfig {
    pub fn from_blueprint(blueprint: &PipelineBlueprint) -> Self {
        Self {
            workers: blueprint.dispatch.workers,
            queue_capacity: blueprint.dispatch.queue_capacity,
            batch: blueprint.batch.as_ref().map(|b| BatchSettings {
                max_size: b.max_size,
                linger: Duration::from_millis(b.linger_ms),
            }),
        }
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    pipeline: Pipeline,
    input_rx: async_channel::Receiver<Notification>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(
        config: DispatcherConfig,
        pipeline: Pipeline,
        input_rx: async_channel::Receiver<Notification>,
    ) -> Self {
        Self {
            config,
            pipeline,
            input_rx,
        }
    }

    /// Spawn the transport worker and assemble the dispatcher
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self, transport),
        fields(destination = %self.pipeline.destination(), workers = self.config.workers)
    )]
    pub fn build<T: DestinationTransport + Send + 'static>(self, transport: T) -> Dispatcher {
        let metrics = Arc::new(DispatchMetrics::new());
        let acknowledger = Acknowledger::new(self.pipeline.destination().as_str(), metrics);
        let handle = TransportHandle::spawn(transport, self.config.queue_capacity, acknowledger);

        // Batching needs a batch formatter; without one records go singly
        let batch = self.config.batch.filter(|_| self.pipeline.is_batching());

        Dispatcher {
            workers: self.config.workers.max(1),
            batch,
            pipeline: Arc::new(self.pipeline),
            handle: Arc::new(handle),
            input_rx: self.input_rx,
        }
    }
}

/// The main Dispatcher: N workers sharing one input queue and one transport
pub struct Dispatcher {
    workers: usize,
    batch: Option<BatchSettings>,
    pipeline: Arc<Pipeline>,
    handle: Arc<TransportHandle>,
    input_rx: async_channel::Receiver<Notification>,
}

impl Dispatcher {
    /// Shared outcome counters
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        self.handle.acknowledger().metrics()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics().snapshot()
    }

    /// Run the dispatcher
    ///
    /// Returns once the input channel is closed and drained, every pending
    /// batch is flushed and the transport has settled every delivery.
    #[instrument(name = "dispatcher_run", skip(self), fields(workers = self.workers))]
    pub async fn run(self) {
        info!(
            destination = %self.pipeline.destination(),
            batching = self.batch.is_some(),
            "Dispatcher started"
        );

        let tasks: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                let pipeline = Arc::clone(&self.pipeline);
                let handle = Arc::clone(&self.handle);
                let rx = self.input_rx.clone();
                let batch = self.batch;
                tokio::spawn(async move {
                    match batch {
                        Some(settings) => batched_worker(id, pipeline, handle, rx, settings).await,
                        None => single_worker(id, pipeline, handle, rx).await,
                    }
                })
            })
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = ?e, "Worker task panicked");
            }
        }

        let snapshot = self.snapshot();
        match Arc::into_inner(self.handle) {
            Some(handle) => handle.shutdown().await,
            None => error!("Transport handle still shared, skipping shutdown"),
        }

        info!(
            dispatched = snapshot.dispatched,
            skipped = snapshot.skipped,
            temporary_failures = snapshot.temporary_failures,
            permanent_failures = snapshot.permanent_failures,
            "Dispatcher shutdown complete"
        );
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }
}

#[instrument(name = "dispatcher_worker", skip(pipeline, handle, rx), fields(worker = id))]
async fn single_worker(
    id: usize,
    pipeline: Arc<Pipeline>,
    handle: Arc<TransportHandle>,
    rx: async_channel::Receiver<Notification>,
) {
    debug!("Worker started");
    let mut processed: u64 = 0;

    while let Ok(notification) = rx.recv().await {
        let disposition = pipeline.process(notification.record);
        deliver(&handle, disposition, vec![notification.ack]);
        processed += 1;
    }

    debug!(processed, "Worker input closed");
}

#[instrument(name = "dispatcher_worker", skip(pipeline, handle, rx, settings), fields(worker = id))]
async fn batched_worker(
    id: usize,
    pipeline: Arc<Pipeline>,
    handle: Arc<TransportHandle>,
    rx: async_channel::Receiver<Notification>,
    settings: BatchSettings,
) {
    debug!(max_size = settings.max_size, linger_ms = settings.linger.as_millis() as u64, "Worker started");
    let mut batcher = Batcher::new(settings.max_size, settings.linger);

    loop {
        let deadline = batcher.next_deadline();
        tokio::select! {
            received = rx.recv() => {
                let Ok(notification) = received else { break };
                match pipeline.prepare(notification.record) {
                    Prepared::Done(disposition) => {
                        deliver(&handle, disposition, vec![notification.ack]);
                    }
                    Prepared::Item(item) => {
                        if let Some(batch) = batcher.push(item, notification.ack, Instant::now()) {
                            flush_batch(&pipeline, &handle, batch);
                        }
                    }
                }
            }
            _ = linger_elapsed(deadline) => {
                for batch in batcher.take_expired(Instant::now()) {
                    flush_batch(&pipeline, &handle, batch);
                }
            }
        }
    }

    let remaining = batcher.drain();
    debug!(batches = remaining.len(), "Worker input closed, flushing");
    for batch in remaining {
        flush_batch(&pipeline, &handle, batch);
    }
}

async fn linger_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn flush_batch(pipeline: &Pipeline, handle: &TransportHandle, batch: Batch) {
    handle.acknowledger().metrics().inc_batches();
    let disposition = pipeline.format_batch(batch.items);
    deliver(handle, disposition, batch.acks);
}

/// Send dispatchable results, settle everything else right away
fn deliver(handle: &TransportHandle, disposition: Disposition, acks: Vec<Option<AckSender>>) {
    match disposition {
        Disposition::Dispatch { route, records } => {
            handle.try_send(Delivery {
                route,
                records,
                acks,
            });
        }
        other => handle.acknowledger().settle_all(acks, other.outcome()),
    }
}

/// Convenience function to create a dispatcher from a validated blueprint
#[instrument(
    name = "dispatcher_create",
    skip(blueprint, registry, transport, input_rx),
    fields(destination = %blueprint.destination.kind)
)]
pub fn create_dispatcher<T: DestinationTransport + Send + 'static>(
    blueprint: &PipelineBlueprint,
    registry: &Registry,
    transport: T,
    input_rx: async_channel::Receiver<Notification>,
) -> Result<Dispatcher, DispatcherError> {
    let pipeline = Pipeline::from_blueprint(blueprint, registry)?;
    let config = DispatcherConfig::from_blueprint(blueprint);
    Ok(DispatcherBuilder::new(config, pipeline, input_rx).build(transport))
}
