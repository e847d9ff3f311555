//! DestinationTransport trait - hand-off to the destination system
//!
//! The wire clients themselves live outside this workspace; a transport
//! only reports success or a coded error back to the dispatcher.

use thiserror::Error;

use crate::{OutboundRecord, OutboundRoute};

/// Transport level failure
///
/// `code` is matched against each record's ignore-errors set to decide
/// between redelivery and a permanent drop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error [{code}]: {message}")]
pub struct TransportError {
    pub code: String,
    pub message: String,
}

impl TransportError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True if every record lists this error code as ignorable
    pub fn is_ignored_by(&self, records: &[OutboundRecord]) -> bool {
        !records.is_empty()
            && records.iter().all(|record| {
                record
                    .ignore_errors()
                    .is_some_and(|codes| codes.contains(&self.code))
            })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::new("io", err.to_string())
    }
}

/// Destination transport
#[trait_variant::make(DestinationTransport: Send)]
pub trait LocalDestinationTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send the records of one dispatch unit to `route`
    async fn send(
        &mut self,
        route: &OutboundRoute,
        records: &[OutboundRecord],
    ) -> Result<(), TransportError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaType, OutboundMetadata};

    #[test]
    fn test_ignored_only_when_every_record_lists_code() {
        let ignoring = OutboundRecord::text("a", MediaType::Json, OutboundMetadata::Jms)
            .with_ignore_errors(["409"]);
        let strict = OutboundRecord::text("b", MediaType::Json, OutboundMetadata::Jms);
        let err = TransportError::new("409", "conflict");

        assert!(err.is_ignored_by(&[ignoring.clone()]));
        assert!(!err.is_ignored_by(&[ignoring, strict]));
        assert!(!err.is_ignored_by(&[]));
        assert!(!TransportError::new("500", "x").is_ignored_by(&[OutboundRecord::text(
            "c",
            MediaType::Json,
            OutboundMetadata::Jms
        )
        .with_ignore_errors(["409"])]));
    }
}
