//! Run orchestrator - feeds an NDJSON file through the dispatcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ChangeNotificationRecord, DestinationTransport, PipelineBlueprint, RecordOutcome};
use dispatcher::{FileTransport, LogTransport, Notification, Registry, create_dispatcher};
use observability::OutcomeAggregator;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use super::RunStats;
use super::recording::RecordingTransport;
use crate::error::CliError;

/// Run configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// The validated pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// NDJSON input with one change notification per line
    pub input: PathBuf,

    /// NDJSON output (None = log only)
    pub output: Option<PathBuf>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main run orchestrator
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// Dispatch every input record and wait for all outcomes
    pub async fn run(self) -> Result<RunStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        match self.config.output.clone() {
            Some(path) => {
                let transport = FileTransport::create("file", &path)
                    .with_context(|| format!("Failed to create output {}", path.display()))?;
                self.dispatch(transport).await
            }
            None => self.dispatch(LogTransport::new("log")).await,
        }
    }

    async fn dispatch<T: DestinationTransport + Send + 'static>(
        &self,
        transport: T,
    ) -> Result<RunStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let aggregator = Arc::new(Mutex::new(OutcomeAggregator::new()));
        let transport = RecordingTransport::new(transport, Arc::clone(&aggregator));

        let (input_tx, input_rx) = async_channel::bounded(blueprint.dispatch.queue_capacity);
        let dispatcher = create_dispatcher(blueprint, &Registry::with_builtins(), transport, input_rx)
            .context("Failed to build dispatcher")?;
        let metrics = Arc::clone(dispatcher.metrics());
        let dispatcher_task = dispatcher.spawn();

        let feed = self.feed_and_collect(input_tx, &aggregator);
        let records = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, feed).await.map_err(|_| {
                CliError::Timeout {
                    seconds: limit.as_secs(),
                }
            })??,
            None => feed.await?,
        };

        dispatcher_task
            .await
            .context("Dispatcher task failed")?;

        let summary = aggregator.lock().await.summary();
        Ok(RunStats {
            records,
            batches: metrics.batches(),
            duration: start_time.elapsed(),
            summary,
        })
    }

    /// Read the input, enqueue every record, then await every acknowledgment
    async fn feed_and_collect(
        &self,
        input_tx: async_channel::Sender<Notification>,
        aggregator: &Mutex<OutcomeAggregator>,
    ) -> Result<u64> {
        let file = File::open(&self.config.input)
            .await
            .with_context(|| format!("Failed to open input {}", self.config.input.display()))?;
        let mut lines = BufReader::new(file).lines();

        let mut acks: Vec<oneshot::Receiver<RecordOutcome>> = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await.map_err(CliError::from)? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: ChangeNotificationRecord = serde_json::from_str(&line)
                .map_err(|e| CliError::input_parse(line_no, e.to_string()))?;

            let (notification, ack) = Notification::with_ack(record);
            input_tx
                .send(notification)
                .await
                .map_err(|_| anyhow::anyhow!("Dispatcher input closed unexpectedly"))?;
            acks.push(ack);
        }
        input_tx.close();
        debug!(records = acks.len(), "Input exhausted");

        let records = acks.len() as u64;
        for ack in acks {
            let outcome = ack.await.unwrap_or_else(|_| {
                warn!("Acknowledgment dropped, counting as temporary failure");
                RecordOutcome::TemporaryFailure
            });
            aggregator.lock().await.record_outcome(outcome);
        }

        Ok(records)
    }
}
