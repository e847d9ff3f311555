//! LogTransport - logs delivery summaries via tracing

use contracts::{DestinationTransport, OutboundRecord, OutboundRoute, TransportError};
use tracing::{info, instrument};

/// Transport that only logs what would be sent
pub struct LogTransport {
    name: String,
}

impl LogTransport {
    /// Create a new LogTransport with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_delivery_summary(&self, route: &OutboundRoute, records: &[OutboundRecord]) {
        let bytes: usize = records
            .iter()
            .filter_map(|r| r.payload_bytes())
            .map(|p| p.len())
            .sum();

        info!(
            transport = %self.name,
            route = %route,
            records = records.len(),
            bytes,
            media_type = records.first().map(|r| r.media_type().as_str()),
            "Delivery sent"
        );
    }
}

impl DestinationTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_transport_send",
        skip(self, route, records),
        fields(transport = %self.name, route = %route)
    )]
    async fn send(
        &mut self,
        route: &OutboundRoute,
        records: &[OutboundRecord],
    ) -> Result<(), TransportError> {
        self.log_delivery_summary(route, records);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    #[instrument(name = "log_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        info!(transport = %self.name, "LogTransport closed");
        Ok(())
    }
}
