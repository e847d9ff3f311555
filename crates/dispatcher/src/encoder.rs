//! Built-in encoder
//!
//! Produces the baseline `formattedRecord` handed to formatters: a JSON
//! rendering of the record (or no payload) plus destination metadata whose
//! dynamic fields are resolved against the record.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};

use contracts::{
    BytesOutboundRecord, ChangeNotificationRecord, ContractError, DestinationConfig,
    DestinationKind, DynamicFieldSource, ElasticsearchOperation, MediaType, OutboundMetadata,
    OutboundRecord, PayloadFormat, TextOutboundRecord, UserKey,
};

/// Baseline encoder for one destination
#[derive(Debug, Clone)]
pub struct Encoder {
    destination: DestinationConfig,
    payload_format: PayloadFormat,
    ignore_errors: HashSet<String>,
}

impl Encoder {
    pub fn new(destination: DestinationConfig, payload_format: PayloadFormat) -> Self {
        let ignore_errors = destination.ignore_errors.iter().cloned().collect();
        Self {
            destination,
            payload_format,
            ignore_errors,
        }
    }

    pub fn destination(&self) -> &DestinationConfig {
        &self.destination
    }

    pub fn payload_format(&self) -> PayloadFormat {
        self.payload_format
    }

    /// Encode `record` into its baseline outbound record
    ///
    /// # Errors
    /// Resolution failures of destination fields escalated by their
    /// failure strategy, or a JSON encoding failure.
    pub fn encode(&self, record: &ChangeNotificationRecord) -> Result<OutboundRecord, ContractError> {
        let metadata = self.metadata(record)?;
        let ignore_errors = self.ignore_errors.clone();

        let encoded = match self.payload_format {
            PayloadFormat::None => OutboundRecord::Bytes(BytesOutboundRecord {
                payload: None,
                media_type: MediaType::OctetStream,
                metadata,
                ignore_errors,
            }),
            PayloadFormat::Json | PayloadFormat::FlatJson => {
                let value = match self.payload_format {
                    PayloadFormat::FlatJson => flat_json(record),
                    _ => nested_json(record),
                };
                let payload = serde_json::to_string(&value)
                    .map_err(|e| ContractError::encoding(e.to_string()))?;
                OutboundRecord::Text(TextOutboundRecord {
                    payload: Some(payload),
                    media_type: self.json_media_type(),
                    metadata,
                    ignore_errors,
                })
            }
        };
        Ok(encoded)
    }

    /// Elasticsearch takes bulk bodies, one document per line
    fn json_media_type(&self) -> MediaType {
        match self.destination.kind {
            DestinationKind::Elasticsearch => MediaType::NdJson,
            _ => MediaType::Json,
        }
    }

    /// Destination metadata for `record`
    pub fn metadata(
        &self,
        record: &ChangeNotificationRecord,
    ) -> Result<OutboundMetadata, ContractError> {
        let dest = &self.destination;
        let metadata = match dest.kind {
            DestinationKind::Kafka => OutboundMetadata::Kafka {
                key: field_resolver::resolve(&dest.key, record)?,
            },
            DestinationKind::Pulsar => OutboundMetadata::Pulsar {
                key: field_resolver::resolve(&dest.key, record)?,
            },
            DestinationKind::Jms => OutboundMetadata::Jms,
            DestinationKind::PubSub => OutboundMetadata::PubSub {
                attributes: (!dest.attributes.is_empty()).then(|| dest.attributes.clone()),
                ordering_key: resolve_text(&dest.ordering_key, record)?,
            },
            DestinationKind::Esp => OutboundMetadata::Esp {
                http_method: dest.esp.http_method.clone(),
                success_status_codes: dest.esp.success_status_codes.clone(),
                path: dest.esp.path.clone(),
                query: (!dest.esp.query.is_empty()).then(|| dest.esp.query.clone()),
                headers: (!dest.esp.headers.is_empty()).then(|| dest.esp.headers.clone()),
            },
            DestinationKind::Elasticsearch => OutboundMetadata::Elasticsearch {
                operation: if record.operation().is_delete() {
                    ElasticsearchOperation::Delete
                } else {
                    dest.write_operation_mapping.operation_type.into()
                },
                index: resolve_text(&dest.index, record)?,
                doc_id: resolve_text(&dest.doc_id, record)?,
                routing: resolve_text(&dest.routing, record)?,
            },
        };
        Ok(metadata)
    }
}

fn resolve_text(
    source: &DynamicFieldSource,
    record: &ChangeNotificationRecord,
) -> Result<Option<String>, ContractError> {
    Ok(field_resolver::resolve(source, record)?.map(|value| value.to_text()))
}

fn metadata_json(record: &ChangeNotificationRecord) -> Map<String, Value> {
    let key = record.key();
    let mut map = Map::new();
    map.insert("namespace".into(), json!(key.namespace));
    if let Some(set) = &key.set {
        map.insert("set".into(), json!(set));
    }
    if let Some(user_key) = &key.user_key {
        let value = match user_key {
            UserKey::Integer(v) => json!(v),
            UserKey::String(s) => json!(s),
            UserKey::Bytes { bytes } => json!(BASE64.encode(bytes)),
        };
        map.insert("userKey".into(), value);
    }
    map.insert("digest".into(), json!(key.digest.to_base64()));
    map.insert("msg".into(), json!(record.operation().as_str()));
    if let Some(generation) = record.generation() {
        map.insert("gen".into(), json!(generation));
    }
    if let Some(lut) = record.last_update_time_ms() {
        map.insert("lut".into(), json!(lut));
    }
    if let Some(ttl) = record.metadata().time_to_live() {
        map.insert("ttl".into(), json!(ttl));
    }
    map
}

fn bins_json(record: &ChangeNotificationRecord) -> Map<String, Value> {
    record
        .bins()
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// `{"metadata": {...}, "bins": {...}}`
fn nested_json(record: &ChangeNotificationRecord) -> Value {
    let mut root = Map::new();
    root.insert("metadata".into(), Value::Object(metadata_json(record)));
    if !record.operation().is_delete() {
        root.insert("bins".into(), Value::Object(bins_json(record)));
    }
    Value::Object(root)
}

/// Metadata fields and bins in one object; metadata wins on name clashes
fn flat_json(record: &ChangeNotificationRecord) -> Value {
    let mut root = if record.operation().is_delete() {
        Map::new()
    } else {
        bins_json(record)
    };
    root.extend(metadata_json(record));
    Value::Object(root)
}
