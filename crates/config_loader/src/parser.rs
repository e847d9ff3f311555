//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        DestinationKind, DynamicFieldSource, FailureStrategy, PayloadFormat, WriteOperation,
    };

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[destination]
type = "kafka"
key = { source = "bin-value", bin-name = "id", failure-strategy = "FAIL" }

[routing]
name = "static"
params = { route = "users" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.destination.kind, DestinationKind::Kafka);
        assert_eq!(
            bp.destination.key,
            DynamicFieldSource::bin_value("id", FailureStrategy::Fail)
        );
        assert_eq!(bp.routing.params["route"], "users");
        assert_eq!(bp.format.payload_format, PayloadFormat::Json);
        assert!(bp.batch.is_none());
        assert_eq!(bp.dispatch.workers, 4);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "destination": { "type": "pubsub", "ordering-key": { "source": "namespace" } },
            "routing": { "name": "static", "params": { "route": "t" } },
            "format": { "payload-format": "flat-json" },
            "batch": { "max-size": 10, "formatter": { "name": "write-json" }, "key": { "source": "key-concat" } }
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.destination.kind, DestinationKind::PubSub);
        assert_eq!(bp.destination.ordering_key, DynamicFieldSource::Namespace);
        assert_eq!(bp.format.payload_format, PayloadFormat::FlatJson);

        let batch = bp.batch.unwrap();
        assert_eq!(batch.max_size, 10);
        assert_eq!(batch.linger_ms, 50);
        assert_eq!(batch.key, DynamicFieldSource::KeyConcat);
    }

    #[test]
    fn test_parse_elasticsearch_write_operation_mapping() {
        let content = r#"
[destination]
type = "elasticsearch"
doc-id = { source = "digest" }
aerospike-write-operation-mapping = { operation-type = "update" }

[routing]
name = "static"
params = { route = "users" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(
            bp.destination.write_operation_mapping.operation_type,
            WriteOperation::Update
        );

        let defaulted = parse_toml(
            "[destination]\ntype = \"elasticsearch\"\n[routing]\nname = \"static\"\n",
        )
        .unwrap();
        assert_eq!(
            defaulted.destination.write_operation_mapping.operation_type,
            WriteOperation::Index
        );

        let rejected = parse_toml(
            "[destination]\ntype = \"elasticsearch\"\naerospike-write-operation-mapping = { operation-type = \"delete\" }\n[routing]\nname = \"static\"\n",
        );
        assert!(matches!(rejected, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_failure_strategy() {
        let content = r#"
[destination]
type = "kafka"
key = { source = "user-key", failure-strategy = "retry" }

[routing]
name = "static"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("unknown failure-strategy"), "got: {err}");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
