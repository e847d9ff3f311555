//! Transport wrapper feeding the run summary

use std::sync::Arc;
use std::time::Instant;

use contracts::{DestinationTransport, OutboundRecord, OutboundRoute, TransportError};
use observability::OutcomeAggregator;
use tokio::sync::Mutex;

/// Records route, delivery size and latency of every send
pub struct RecordingTransport<T> {
    inner: T,
    aggregator: Arc<Mutex<OutcomeAggregator>>,
}

impl<T> RecordingTransport<T> {
    pub fn new(inner: T, aggregator: Arc<Mutex<OutcomeAggregator>>) -> Self {
        Self { inner, aggregator }
    }
}

impl<T: DestinationTransport + Send> DestinationTransport for RecordingTransport<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(
        &mut self,
        route: &OutboundRoute,
        records: &[OutboundRecord],
    ) -> Result<(), TransportError> {
        let started = Instant::now();
        let result = self.inner.send(route, records).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut aggregator = self.aggregator.lock().await;
        aggregator.record_route(route.to_string());
        aggregator.record_batch(records.len());
        aggregator.record_latency_ms(latency_ms);
        result
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.inner.flush().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}
