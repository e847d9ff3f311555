//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DestinationKind, DynamicFieldSource, PayloadFormat, PipelineBlueprint};
use dispatcher::{Pipeline, Registry};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    destination: String,
    router: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formatter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_formatter: Option<String>,
    workers: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: None,
        summary: None,
    };

    if !args.config.exists() {
        return invalid(format!("File not found: {}", args.config.display()));
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(e.to_string()),
    };

    // Stage names only resolve against the registry
    if let Err(e) = Pipeline::from_blueprint(&blueprint, &Registry::with_builtins()) {
        return invalid(e.to_string());
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path: config_path.clone(),
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            destination: blueprint.destination.kind.to_string(),
            router: blueprint.routing.name.clone(),
            transformer: blueprint.transformer.as_ref().map(|t| t.name.clone()),
            formatter: blueprint.format.formatter.as_ref().map(|f| f.name.clone()),
            batch_formatter: blueprint.batch.as_ref().map(|b| b.formatter.name.clone()),
            workers: blueprint.dispatch.workers,
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(batch) = &blueprint.batch {
        let keyed = matches!(
            blueprint.destination.kind,
            DestinationKind::Kafka | DestinationKind::Pulsar
        );
        if !keyed && batch.key != DynamicFieldSource::None {
            warnings.push(format!(
                "batch.key is ignored for {} destinations",
                blueprint.destination.kind
            ));
        }
        if blueprint.format.formatter.is_some() {
            warnings.push("format.formatter is not used when batching is enabled".to_string());
        }
    }

    if blueprint.format.payload_format == PayloadFormat::None
        && blueprint.format.formatter.is_some()
    {
        warnings.push(
            "payload-format is none - formatter receives a baseline record without payload"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Destination: {}", summary.destination);
            println!("  Router: {}", summary.router);
            if let Some(ref transformer) = summary.transformer {
                println!("  Transformer: {}", transformer);
            }
            if let Some(ref formatter) = summary.formatter {
                println!("  Formatter: {}", formatter);
            }
            if let Some(ref batch_formatter) = summary.batch_formatter {
                println!("  Batch formatter: {}", batch_formatter);
            }
            println!("  Workers: {}", summary.workers);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
