//! PipelineBlueprint - Config Loader output
//!
//! Describes one outbound pipeline: destination, stages, built-in format,
//! optional batching and worker layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{DestinationKind, DynamicFieldSource, ElasticsearchOperation};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    pub destination: DestinationConfig,

    pub routing: StageSpec,

    #[serde(default)]
    pub transformer: Option<StageSpec>,

    #[serde(default)]
    pub format: FormatConfig,

    /// Enables batch formatting when present
    #[serde(default)]
    pub batch: Option<BatchConfig>,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Name plus free-form parameters of a router, transformer or formatter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,

    #[serde(default)]
    pub params: Map<String, Value>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Destination and its per-record dynamic fields
///
/// Only the fields meaningful for `kind` are consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DestinationConfig {
    #[serde(rename = "type")]
    pub kind: DestinationKind,

    /// Kafka/Pulsar message key
    #[serde(default)]
    pub key: DynamicFieldSource,

    /// Pub/Sub ordering key
    #[serde(default)]
    pub ordering_key: DynamicFieldSource,

    /// Pub/Sub static message attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Elasticsearch index override
    #[serde(default)]
    pub index: DynamicFieldSource,

    /// Elasticsearch document id
    #[serde(default)]
    pub doc_id: DynamicFieldSource,

    /// Elasticsearch shard routing
    #[serde(default)]
    pub routing: DynamicFieldSource,

    /// Elasticsearch action for WRITE notifications; deletes always map to `delete`
    #[serde(default, rename = "aerospike-write-operation-mapping")]
    pub write_operation_mapping: WriteOperationMapping,

    #[serde(default)]
    pub esp: EspConfig,

    /// Transport error codes acknowledged instead of redelivered
    #[serde(default)]
    pub ignore_errors: Vec<String>,
}

impl DestinationConfig {
    pub fn new(kind: DestinationKind) -> Self {
        Self {
            kind,
            key: DynamicFieldSource::None,
            ordering_key: DynamicFieldSource::None,
            attributes: BTreeMap::new(),
            index: DynamicFieldSource::None,
            doc_id: DynamicFieldSource::None,
            routing: DynamicFieldSource::None,
            write_operation_mapping: WriteOperationMapping::default(),
            esp: EspConfig::default(),
            ignore_errors: Vec::new(),
        }
    }

    /// Single-record dynamic fields with their config paths
    pub fn record_fields(&self) -> [(&'static str, &DynamicFieldSource); 5] {
        [
            ("destination.key", &self.key),
            ("destination.ordering-key", &self.ordering_key),
            ("destination.index", &self.index),
            ("destination.doc-id", &self.doc_id),
            ("destination.routing", &self.routing),
        ]
    }
}

/// Elasticsearch operation a WRITE notification is mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    #[default]
    Index,
    Create,
    Update,
}

impl From<WriteOperation> for ElasticsearchOperation {
    fn from(operation: WriteOperation) -> Self {
        match operation {
            WriteOperation::Index => Self::Index,
            WriteOperation::Create => Self::Create,
            WriteOperation::Update => Self::Update,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WriteOperationMapping {
    #[serde(default)]
    pub operation_type: WriteOperation,
}

/// HTTP (ESP) request shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EspConfig {
    #[serde(default = "default_http_method")]
    pub http_method: String,

    #[serde(default)]
    pub success_status_codes: Option<Vec<u16>>,

    /// Must start with `/` when set
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub query: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            http_method: default_http_method(),
            success_status_codes: None,
            path: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_http_method() -> String {
    "POST".to_string()
}

/// Built-in encoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// No baseline payload, a formatter must produce one
    None,
    #[default]
    Json,
    /// Bins at the top level next to the metadata fields
    FlatJson,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FormatConfig {
    #[serde(default)]
    pub payload_format: PayloadFormat,

    #[serde(default)]
    pub formatter: Option<StageSpec>,
}

/// Batch accumulation and formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,

    pub formatter: StageSpec,

    /// Key of the batched outbound record
    #[serde(default)]
    pub key: DynamicFieldSource,
}

fn default_max_size() -> usize {
    100
}

fn default_linger_ms() -> u64 {
    50
}

/// Worker layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the notification and transport queues
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl PipelineBlueprint {
    /// Minimal blueprint: destination plus router, JSON payload, no batching
    pub fn new(destination: DestinationConfig, routing: StageSpec) -> Self {
        Self {
            version: ConfigVersion::V1,
            destination,
            routing,
            transformer: None,
            format: FormatConfig::default(),
            batch: None,
            dispatch: DispatchConfig::default(),
        }
    }
}
