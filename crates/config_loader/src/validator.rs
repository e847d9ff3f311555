//! 配置校验模块
//!
//! 校验规则：
//! - every dynamic field source passes its own `validate()`
//! - per-record key fields only use single-record capable sources
//! - the batch key only uses batch capable sources
//! - stage names are non-empty
//! - max-size / workers / queue-capacity > 0
//! - payload-format `none` needs a formatter or batch formatter
//! - ESP path starts with `/`

use contracts::{ContractError, DestinationKind, PayloadFormat, PipelineBlueprint, StageSpec};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_record_fields(blueprint)?;
    validate_batch(blueprint)?;
    validate_stage_names(blueprint)?;
    validate_payload_format(blueprint)?;
    validate_dispatch(blueprint)?;
    validate_esp(blueprint)?;
    Ok(())
}

fn validate_record_fields(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for (path, source) in blueprint.destination.record_fields() {
        source.validate().map_err(|e| nest(path, e))?;

        if !source.is_allowed_for_single_record_key() {
            return Err(ContractError::config_validation(
                path,
                format!("'{}' source is only allowed for batch keys", source.name()),
            ));
        }
    }
    Ok(())
}

fn validate_batch(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let Some(batch) = &blueprint.batch else {
        return Ok(());
    };

    batch.key.validate().map_err(|e| nest("batch.key", e))?;
    if !batch.key.is_allowed_for_batch_key() {
        return Err(ContractError::config_validation(
            "batch.key",
            format!(
                "'{}' source is not allowed for batch keys",
                batch.key.name()
            ),
        ));
    }

    if batch.max_size == 0 {
        return Err(ContractError::config_validation(
            "batch.max-size",
            "max-size must be > 0",
        ));
    }
    Ok(())
}

fn validate_stage_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let stages: [(&str, Option<&StageSpec>); 4] = [
        ("routing.name", Some(&blueprint.routing)),
        ("transformer.name", blueprint.transformer.as_ref()),
        ("format.formatter.name", blueprint.format.formatter.as_ref()),
        (
            "batch.formatter.name",
            blueprint.batch.as_ref().map(|b| &b.formatter),
        ),
    ];

    for (path, stage) in stages {
        if let Some(stage) = stage {
            if stage.name.trim().is_empty() {
                return Err(ContractError::config_validation(
                    path,
                    "stage name cannot be empty",
                ));
            }
        }
    }
    Ok(())
}

fn validate_payload_format(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let has_formatter = blueprint.format.formatter.is_some() || blueprint.batch.is_some();
    if blueprint.format.payload_format == PayloadFormat::None && !has_formatter {
        return Err(ContractError::config_validation(
            "format.payload-format",
            "payload-format 'none' requires a formatter or batch formatter",
        ));
    }
    Ok(())
}

fn validate_dispatch(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let dispatch = &blueprint.dispatch;
    if dispatch.workers == 0 {
        return Err(ContractError::config_validation(
            "dispatch.workers",
            "workers must be > 0",
        ));
    }
    if dispatch.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "dispatch.queue-capacity",
            "queue-capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_esp(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.destination.kind != DestinationKind::Esp {
        return Ok(());
    }
    match &blueprint.destination.esp.path {
        Some(path) if !path.starts_with('/') => Err(ContractError::config_validation(
            "destination.esp.path",
            format!("path must start with '/', got '{path}'"),
        )),
        _ => Ok(()),
    }
}

/// Prefix the field of a nested validation error with its config path
fn nest(path: &str, err: ContractError) -> ContractError {
    match err {
        ContractError::ConfigValidation { field, message } => {
            ContractError::config_validation(format!("{path}.{field}"), message)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BatchConfig, DestinationConfig, DynamicFieldSource, FailureStrategy,
    };

    fn minimal_blueprint() -> PipelineBlueprint {
        let mut destination = DestinationConfig::new(DestinationKind::Kafka);
        destination.key = DynamicFieldSource::bin_value("id", FailureStrategy::UseDigest);
        PipelineBlueprint::new(
            destination,
            StageSpec::new("static").with_param("route", "users"),
        )
    }

    fn batch(key: DynamicFieldSource) -> BatchConfig {
        BatchConfig {
            max_size: 10,
            linger_ms: 5,
            formatter: StageSpec::new("write-json"),
            key,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_blank_static_value() {
        let mut bp = minimal_blueprint();
        bp.destination.key = DynamicFieldSource::static_value("");
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("value cannot be blank"), "got: {err}");
        assert!(err.contains("destination.key.value"), "got: {err}");
    }

    #[test]
    fn test_blank_bin_name() {
        let mut bp = minimal_blueprint();
        bp.destination.doc_id = DynamicFieldSource::bin_value("", FailureStrategy::Fail);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("bin-name cannot be blank"), "got: {err}");
    }

    #[test]
    fn test_key_hash_rejected_for_single_record_key() {
        let mut bp = minimal_blueprint();
        bp.destination.key = DynamicFieldSource::KeyHash;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("only allowed for batch keys"), "got: {err}");
    }

    #[test]
    fn test_batch_key_capabilities() {
        let mut bp = minimal_blueprint();
        bp.batch = Some(batch(DynamicFieldSource::KeyHash));
        assert!(validate(&bp).is_ok());

        bp.batch = Some(batch(DynamicFieldSource::Namespace));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not allowed for batch keys"), "got: {err}");
    }

    #[test]
    fn test_zero_max_size() {
        let mut bp = minimal_blueprint();
        let mut config = batch(DynamicFieldSource::None);
        config.max_size = 0;
        bp.batch = Some(config);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("max-size must be > 0"), "got: {err}");
    }

    #[test]
    fn test_empty_stage_name() {
        let mut bp = minimal_blueprint();
        bp.transformer = Some(StageSpec::new(" "));
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("transformer.name"), "got: {err}");
    }

    #[test]
    fn test_payload_format_none_needs_formatter() {
        let mut bp = minimal_blueprint();
        bp.format.payload_format = PayloadFormat::None;
        assert!(validate(&bp).is_err());

        bp.format.formatter = Some(StageSpec::new("key-value"));
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut bp = minimal_blueprint();
        bp.dispatch.workers = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("workers must be > 0"), "got: {err}");
    }

    #[test]
    fn test_esp_path_must_be_absolute() {
        let mut bp = minimal_blueprint();
        bp.destination = DestinationConfig::new(DestinationKind::Esp);
        bp.destination.esp.path = Some("events".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("must start with '/'"), "got: {err}");

        bp.destination.esp.path = Some("/events".into());
        assert!(validate(&bp).is_ok());
    }
}
