//! OutboundRecord - formatter output handed to a destination transport

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::{ChangeNotificationRecord, OutboundRoute};

/// Payload media type understood by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "application/x-ndjson")]
    NdJson,
    #[serde(rename = "application/avro")]
    Avro,
    #[serde(rename = "application/x-msgpack")]
    MessagePack,
    #[serde(rename = "application/octet-stream")]
    OctetStream,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::NdJson => "application/x-ndjson",
            Self::Avro => "application/avro",
            Self::MessagePack => "application/x-msgpack",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved value of a dynamic field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Bytes(#[serde(with = "crate::serde_base64")] Bytes),
}

impl FieldValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }

    /// Text as is, bytes as Base64
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bytes(b) => BASE64.encode(b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Bytes> for FieldValue {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

/// Destination-specific metadata attached to an outbound record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "destination", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum OutboundMetadata {
    Kafka {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<FieldValue>,
    },
    Pulsar {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<FieldValue>,
    },
    Jms,
    #[serde(rename = "pubsub")]
    PubSub {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<BTreeMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ordering_key: Option<String>,
    },
    Esp {
        http_method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success_status_codes: Option<Vec<u16>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<BTreeMap<String, Vec<String>>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<BTreeMap<String, Vec<String>>>,
    },
    Elasticsearch {
        #[serde(default)]
        operation: ElasticsearchOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        doc_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        routing: Option<String>,
    },
}

/// Bulk action of an Elasticsearch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElasticsearchOperation {
    #[default]
    Index,
    Create,
    Update,
    Delete,
}

impl ElasticsearchOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ElasticsearchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutboundMetadata {
    /// Partition/message key for destinations that have one
    pub fn key(&self) -> Option<&FieldValue> {
        match self {
            Self::Kafka { key } | Self::Pulsar { key } => key.as_ref(),
            _ => None,
        }
    }

    /// Copy of this metadata with the partition key replaced
    ///
    /// Destinations without a key are returned unchanged.
    pub fn with_key(&self, new_key: Option<FieldValue>) -> Self {
        match self {
            Self::Kafka { .. } => Self::Kafka { key: new_key },
            Self::Pulsar { .. } => Self::Pulsar { key: new_key },
            other => other.clone(),
        }
    }

    /// Copy keeping only the static destination settings
    ///
    /// Fields resolved from one record (message key, ordering key, document
    /// id, index, routing) are cleared, so a record built for a whole batch
    /// does not inherit them from an arbitrary member.
    pub fn without_record_fields(&self) -> Self {
        match self {
            Self::Kafka { .. } => Self::Kafka { key: None },
            Self::Pulsar { .. } => Self::Pulsar { key: None },
            Self::PubSub { attributes, .. } => Self::PubSub {
                attributes: attributes.clone(),
                ordering_key: None,
            },
            Self::Elasticsearch { operation, .. } => Self::Elasticsearch {
                operation: *operation,
                index: None,
                doc_id: None,
                routing: None,
            },
            other => other.clone(),
        }
    }
}

/// Outbound record with a binary payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesOutboundRecord {
    /// `None` only for built-in output when no payload format is configured
    pub payload: Option<Bytes>,
    pub media_type: MediaType,
    pub metadata: OutboundMetadata,
    /// Transport error codes that are acknowledged instead of redelivered
    pub ignore_errors: HashSet<String>,
}

/// Outbound record with a text payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOutboundRecord {
    pub payload: Option<String>,
    pub media_type: MediaType,
    pub metadata: OutboundMetadata,
    pub ignore_errors: HashSet<String>,
}

/// Marker telling the pipeline to drop the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutboundRecord {
    pub media_type: MediaType,
    pub metadata: OutboundMetadata,
}

/// Formatter output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRecord {
    Bytes(BytesOutboundRecord),
    Text(TextOutboundRecord),
    Skip(SkipOutboundRecord),
}

impl OutboundRecord {
    pub fn bytes(payload: impl Into<Bytes>, media_type: MediaType, metadata: OutboundMetadata) -> Self {
        Self::Bytes(BytesOutboundRecord {
            payload: Some(payload.into()),
            media_type,
            metadata,
            ignore_errors: HashSet::new(),
        })
    }

    pub fn text(payload: impl Into<String>, media_type: MediaType, metadata: OutboundMetadata) -> Self {
        Self::Text(TextOutboundRecord {
            payload: Some(payload.into()),
            media_type,
            metadata,
            ignore_errors: HashSet::new(),
        })
    }

    pub fn skip(media_type: MediaType, metadata: OutboundMetadata) -> Self {
        Self::Skip(SkipOutboundRecord {
            media_type,
            metadata,
        })
    }

    /// Replace the ignorable transport error codes; no-op for skip records
    pub fn with_ignore_errors<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: HashSet<String> = codes.into_iter().map(Into::into).collect();
        match &mut self {
            Self::Bytes(r) => r.ignore_errors = codes,
            Self::Text(r) => r.ignore_errors = codes,
            Self::Skip(_) => {}
        }
        self
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Bytes(r) => r.media_type,
            Self::Text(r) => r.media_type,
            Self::Skip(r) => r.media_type,
        }
    }

    pub fn metadata(&self) -> &OutboundMetadata {
        match self {
            Self::Bytes(r) => &r.metadata,
            Self::Text(r) => &r.metadata,
            Self::Skip(r) => &r.metadata,
        }
    }

    /// Payload as bytes, `None` for skip records and unmaterialized payloads
    pub fn payload_bytes(&self) -> Option<Bytes> {
        match self {
            Self::Bytes(r) => r.payload.clone(),
            Self::Text(r) => r.payload.as_ref().map(|s| Bytes::from(s.clone())),
            Self::Skip(_) => None,
        }
    }

    pub fn has_payload(&self) -> bool {
        match self {
            Self::Bytes(r) => r.payload.is_some(),
            Self::Text(r) => r.payload.is_some(),
            Self::Skip(_) => false,
        }
    }

    pub fn ignore_errors(&self) -> Option<&HashSet<String>> {
        match self {
            Self::Bytes(r) => Some(&r.ignore_errors),
            Self::Text(r) => Some(&r.ignore_errors),
            Self::Skip(_) => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }
}

/// Single-record formatter input
#[derive(Debug, Clone)]
pub struct FormatterInput {
    pub record: ChangeNotificationRecord,
    /// Built-in encoder output, reusable as a baseline
    pub formatted_record: OutboundRecord,
    pub route: OutboundRoute,
}

/// One record of a batch, already routed and built-in formatted
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub record: ChangeNotificationRecord,
    pub formatted_record: OutboundRecord,
    pub route: OutboundRoute,
}
