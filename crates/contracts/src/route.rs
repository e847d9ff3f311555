//! OutboundRoute - where a record goes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of destination endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Topic,
    Queue,
    Other,
    /// Record is dropped by the pipeline
    Skip,
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Topic => "topic",
            Self::Queue => "queue",
            Self::Other => "other",
            Self::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// Destination-specific route payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteTarget {
    /// Topic, queue, URL path or index name
    Name(String),
    /// Pub/Sub topic with an optional regional endpoint
    PubSub {
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regional_endpoint: Option<String>,
    },
}

impl RouteTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::PubSub { topic, .. } => topic,
        }
    }
}

/// Destination route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundRoute {
    pub route_type: RouteType,
    pub target: RouteTarget,
}

impl OutboundRoute {
    pub fn new(route_type: RouteType, target: impl Into<String>) -> Self {
        Self {
            route_type,
            target: RouteTarget::Name(target.into()),
        }
    }

    /// Kafka topic
    pub fn kafka(topic: impl Into<String>) -> Self {
        Self::new(RouteType::Topic, topic)
    }

    /// Pulsar topic
    pub fn pulsar(topic: impl Into<String>) -> Self {
        Self::new(RouteType::Topic, topic)
    }

    /// JMS topic or queue
    pub fn jms(route_type: RouteType, name: impl Into<String>) -> Self {
        Self::new(route_type, name)
    }

    /// HTTP path relative to the configured endpoint
    pub fn esp(path: impl Into<String>) -> Self {
        Self::new(RouteType::Other, path)
    }

    /// Elasticsearch index
    pub fn elasticsearch(index: impl Into<String>) -> Self {
        Self::new(RouteType::Other, index)
    }

    pub fn pubsub(topic: impl Into<String>, regional_endpoint: Option<String>) -> Self {
        Self {
            route_type: RouteType::Topic,
            target: RouteTarget::PubSub {
                topic: topic.into(),
                regional_endpoint,
            },
        }
    }

    /// Route that drops the record
    pub fn skip() -> Self {
        Self::new(RouteType::Skip, "")
    }

    pub fn is_skip(&self) -> bool {
        self.route_type == RouteType::Skip
    }

    pub fn name(&self) -> &str {
        self.target.name()
    }
}

impl fmt::Display for OutboundRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            RouteTarget::PubSub {
                topic,
                regional_endpoint: Some(endpoint),
            } => write!(f, "{}:{}@{}", self.route_type, topic, endpoint),
            target => write!(f, "{}:{}", self.route_type, target.name()),
        }
    }
}
