//! Built-in formatters and batch formatters

use std::collections::BTreeMap;

use contracts::{
    BatchFormatter, BatchItem, ContractError, Formatter, FormatterInput, MediaType, Operation,
    OutboundRecord, StageConfig,
};
use serde_json::json;

use super::is_older_than;

/// Keep the baseline's ignorable error codes on a derived record
fn inherit_ignore_errors(record: OutboundRecord, baseline: &OutboundRecord) -> OutboundRecord {
    match baseline.ignore_errors() {
        Some(codes) => record.with_ignore_errors(codes.iter().cloned()),
        None => record,
    }
}

fn baseline_payload(baseline: &OutboundRecord) -> Result<bytes::Bytes, ContractError> {
    baseline
        .payload_bytes()
        .ok_or_else(|| ContractError::format("built-in payload format is not configured"))
}

/// `name<separator>value` per line for every string bin
#[derive(Debug, Clone)]
pub struct KeyValueFormatter {
    separator: String,
}

impl KeyValueFormatter {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self::new(config.str_or("separator", ":")?))
    }
}

impl Formatter for KeyValueFormatter {
    fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
        let payload: String = input
            .record
            .bins()
            .iter()
            .filter_map(|(name, value)| value.as_str().map(|v| (name, v)))
            .map(|(name, value)| format!("{name}{}{value}\n", self.separator))
            .collect();

        let baseline = &input.formatted_record;
        Ok(inherit_ignore_errors(
            OutboundRecord::text(payload, MediaType::OctetStream, baseline.metadata().clone()),
            baseline,
        ))
    }
}

/// Wraps the built-in JSON payload with a dispatch timestamp
#[derive(Debug, Clone, Default)]
pub struct WrapBuiltinJsonFormatter;

impl Formatter for WrapBuiltinJsonFormatter {
    fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
        let baseline = &input.formatted_record;
        let payload = baseline_payload(baseline)?;

        let wrapped = json!({
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "recordPayload": String::from_utf8_lossy(&payload),
        });
        let bytes =
            serde_json::to_vec(&wrapped).map_err(|e| ContractError::format(e.to_string()))?;

        Ok(inherit_ignore_errors(
            OutboundRecord::bytes(bytes, MediaType::Json, baseline.metadata().clone()),
            baseline,
        ))
    }
}

/// Skips records above a generation threshold, passes the baseline otherwise
#[derive(Debug, Clone)]
pub struct GenerationSkipFormatter {
    gen_number: u64,
}

impl GenerationSkipFormatter {
    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self {
            gen_number: config.require_u64("gen-number")?,
        })
    }
}

impl Formatter for GenerationSkipFormatter {
    fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
        if is_older_than(input.record.generation(), self.gen_number) {
            let baseline = &input.formatted_record;
            return Ok(OutboundRecord::skip(
                baseline.media_type(),
                baseline.metadata().clone(),
            ));
        }
        Ok(input.formatted_record)
    }
}

/// Chooses between a text and a binary message for the baseline payload
#[derive(Debug, Clone)]
pub struct MessageTypeFormatter {
    as_text: bool,
}

impl MessageTypeFormatter {
    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self {
            as_text: config.bool_or("as-text", false)?,
        })
    }
}

impl Formatter for MessageTypeFormatter {
    fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
        let baseline = &input.formatted_record;
        let payload = baseline_payload(baseline)?;
        let metadata = baseline.metadata().clone();

        let record = if self.as_text {
            let text = String::from_utf8(payload.to_vec())
                .map_err(|e| ContractError::format(format!("payload is not UTF-8: {e}")))?;
            OutboundRecord::text(text, baseline.media_type(), metadata)
        } else {
            OutboundRecord::bytes(payload, baseline.media_type(), metadata)
        };
        Ok(inherit_ignore_errors(record, baseline))
    }
}

/// Collapses the WRITE records of a batch into one JSON document
///
/// The document maps each record key to its bins rendered as strings. When
/// a key occurs more than once the later notification in batch order wins.
/// The output carries the destination's static metadata only; its key is
/// set from the batch key source. Batches without any WRITE record produce
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteJsonBatchFormatter;

impl BatchFormatter for WriteJsonBatchFormatter {
    fn format(&self, items: Vec<BatchItem>) -> Result<Vec<OutboundRecord>, ContractError> {
        let writes: Vec<&BatchItem> = items
            .iter()
            .filter(|item| item.record.operation() == Operation::Write)
            .collect();

        let Some(first) = writes.first() else {
            return Ok(Vec::new());
        };

        let records: BTreeMap<String, BTreeMap<&str, String>> = writes
            .iter()
            .map(|item| {
                let bins = item
                    .record
                    .bins()
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.to_display_string()))
                    .collect();
                (item.record.key().to_string(), bins)
            })
            .collect();

        let payload =
            serde_json::to_string(&records).map_err(|e| ContractError::format(e.to_string()))?;
        let baseline = &first.formatted_record;

        Ok(vec![inherit_ignore_errors(
            OutboundRecord::text(
                payload,
                MediaType::OctetStream,
                baseline.metadata().without_record_fields(),
            ),
            baseline,
        )])
    }
}
