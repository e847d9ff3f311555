//! Stage traits - Router / Transformer / Formatter / BatchFormatter
//!
//! Stages are reentrant and called concurrently from every dispatcher
//! worker. A stage holding shared state synchronizes it itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{
    BatchItem, ChangeNotificationRecord, ContractError, FormatterInput, OutboundRecord,
    OutboundRoute, RouteType, Transformed,
};

/// Destination system the pipeline feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    Kafka,
    Pulsar,
    Jms,
    #[serde(rename = "pubsub")]
    PubSub,
    Esp,
    Elasticsearch,
}

impl DestinationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kafka => "kafka",
            Self::Pulsar => "pulsar",
            Self::Jms => "jms",
            Self::PubSub => "pubsub",
            Self::Esp => "esp",
            Self::Elasticsearch => "elasticsearch",
        }
    }

    /// Route for a configured route name
    ///
    /// `jms_route_type` is only consulted for JMS, which can target both
    /// topics and queues.
    pub fn route(self, name: &str, jms_route_type: RouteType) -> OutboundRoute {
        match self {
            Self::Kafka => OutboundRoute::kafka(name),
            Self::Pulsar => OutboundRoute::pulsar(name),
            Self::Jms => OutboundRoute::jms(jms_route_type, name),
            Self::PubSub => OutboundRoute::pubsub(name, None),
            Self::Esp => OutboundRoute::esp(name),
            Self::Elasticsearch => OutboundRoute::elasticsearch(name),
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction input of a stage
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub destination: DestinationKind,
    pub params: Map<String, Value>,
}

impl StageConfig {
    pub fn new(destination: DestinationKind, params: Map<String, Value>) -> Self {
        Self {
            destination,
            params,
        }
    }

    /// Required string parameter
    pub fn require_str(&self, name: &str) -> Result<String, ContractError> {
        match self.params.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(Self::invalid(name, "cannot be blank")),
            Some(_) => Err(Self::invalid(name, "must be a string")),
            None => Err(Self::invalid(name, "is required")),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> Result<String, ContractError> {
        match self.params.get(name) {
            None => Ok(default.to_string()),
            Some(_) => self.require_str(name),
        }
    }

    /// Required non-negative integer parameter
    pub fn require_u64(&self, name: &str) -> Result<u64, ContractError> {
        match self.params.get(name) {
            Some(value) => value
                .as_u64()
                .ok_or_else(|| Self::invalid(name, "must be a non-negative integer")),
            None => Err(Self::invalid(name, "is required")),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ContractError> {
        match self.params.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(Self::invalid(name, "must be a boolean")),
        }
    }

    /// Optional JSON object parameter
    pub fn object(&self, name: &str) -> Result<Option<Map<String, Value>>, ContractError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(Self::invalid(name, "must be an object")),
        }
    }

    pub fn optional_str(&self, name: &str) -> Result<Option<String>, ContractError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(_) => self.require_str(name).map(Some),
        }
    }

    /// Route parameter mapped through the destination kind
    ///
    /// Pub/Sub routes take an optional `regional-endpoint` parameter.
    pub fn route(&self, name: &str) -> Result<OutboundRoute, ContractError> {
        let target = self.require_str(name)?;
        match self.destination {
            DestinationKind::PubSub => Ok(OutboundRoute::pubsub(
                target,
                self.optional_str("regional-endpoint")?,
            )),
            kind => Ok(kind.route(&target, self.jms_route_type()?)),
        }
    }

    fn jms_route_type(&self) -> Result<RouteType, ContractError> {
        match self.str_or("route-type", "queue")?.to_ascii_lowercase().as_str() {
            "queue" => Ok(RouteType::Queue),
            "topic" => Ok(RouteType::Topic),
            other => Err(Self::invalid(
                "route-type",
                format!("must be 'queue' or 'topic', got '{other}'"),
            )),
        }
    }

    fn invalid(name: &str, message: impl Into<String>) -> ContractError {
        ContractError::config_validation(format!("params.{name}"), message)
    }
}

/// Decides where a record goes
pub trait Router: Send + Sync {
    /// # Errors
    /// Any error is a temporary failure of the record.
    fn route(&self, record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError>;
}

/// Rebuilds a record before formatting
pub trait Transformer: Send + Sync {
    /// Returns a new record, or [`Transformed::Skip`] to drop it.
    fn transform(&self, record: ChangeNotificationRecord) -> Result<Transformed, ContractError>;
}

/// Shapes one record for its destination
pub trait Formatter: Send + Sync {
    fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError>;
}

/// Shapes a whole batch for its destination
///
/// The outcome applies to every item: an error fails the whole batch and
/// an empty result skips it.
pub trait BatchFormatter: Send + Sync {
    fn format(&self, items: Vec<BatchItem>) -> Result<Vec<OutboundRecord>, ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(destination: DestinationKind, params: Value) -> StageConfig {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        StageConfig::new(destination, params)
    }

    #[test]
    fn test_route_mapping_by_destination() {
        let kafka = config(DestinationKind::Kafka, json!({"route": "users"}));
        assert_eq!(kafka.route("route").unwrap(), OutboundRoute::kafka("users"));

        let esp = config(DestinationKind::Esp, json!({"route": "internal"}));
        assert_eq!(esp.route("route").unwrap().route_type, RouteType::Other);

        let jms = config(DestinationKind::Jms, json!({"route": "q"}));
        assert_eq!(jms.route("route").unwrap().route_type, RouteType::Queue);

        let jms = config(
            DestinationKind::Jms,
            json!({"route": "t", "route-type": "TOPIC"}),
        );
        assert_eq!(jms.route("route").unwrap().route_type, RouteType::Topic);
    }

    #[test]
    fn test_pubsub_regional_endpoint() {
        let regional = config(
            DestinationKind::PubSub,
            json!({"route": "events", "regional-endpoint": "europe-west1-pubsub.googleapis.com:443"}),
        );
        assert_eq!(
            regional.route("route").unwrap(),
            OutboundRoute::pubsub(
                "events",
                Some("europe-west1-pubsub.googleapis.com:443".to_string())
            )
        );

        let global = config(DestinationKind::PubSub, json!({"route": "events"}));
        assert_eq!(
            global.route("route").unwrap(),
            OutboundRoute::pubsub("events", None)
        );

        let blank = config(
            DestinationKind::PubSub,
            json!({"route": "events", "regional-endpoint": ""}),
        );
        assert!(blank.route("route").is_err());
    }

    #[test]
    fn test_param_errors() {
        let cfg = config(DestinationKind::Kafka, json!({"n": "x", "blank": " "}));
        assert!(cfg.require_str("missing").unwrap_err().to_string().contains("is required"));
        assert!(cfg.require_str("blank").unwrap_err().to_string().contains("blank"));
        assert!(cfg.require_u64("n").is_err());
        assert!(!cfg.bool_or("flag", false).unwrap());
        assert_eq!(cfg.str_or("sep", ":").unwrap(), ":");
    }
}
