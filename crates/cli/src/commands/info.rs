//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DynamicFieldSource, PipelineBlueprint, StageSpec};
use dispatcher::Registry;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    destination: DestinationInfo,
    stages: Vec<StageInfo>,
    payload_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<BatchInfo>,
    workers: usize,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    registered: Option<RegisteredInfo>,
}

#[derive(Serialize)]
struct DestinationInfo {
    kind: String,
    /// Dynamic fields other than `none`
    fields: Vec<FieldInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ignore_errors: Vec<String>,
}

#[derive(Serialize)]
struct FieldInfo {
    path: String,
    source: String,
}

#[derive(Serialize)]
struct StageInfo {
    kind: String,
    name: String,
    params: usize,
}

#[derive(Serialize)]
struct BatchInfo {
    max_size: usize,
    linger_ms: u64,
    formatter: String,
    key: String,
}

#[derive(Serialize)]
struct RegisteredInfo {
    routers: Vec<String>,
    transformers: Vec<String>,
    formatters: Vec<String>,
    batch_formatters: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn stage_info(kind: &str, spec: &StageSpec) -> StageInfo {
    StageInfo {
        kind: kind.to_string(),
        name: spec.name.clone(),
        params: spec.params.len(),
    }
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let destination = &blueprint.destination;
    let fields = destination
        .record_fields()
        .into_iter()
        .filter(|(_, source)| **source != DynamicFieldSource::None)
        .map(|(path, source)| FieldInfo {
            path: path.to_string(),
            source: source.to_string(),
        })
        .collect();

    let mut stages = vec![stage_info("router", &blueprint.routing)];
    if let Some(ref transformer) = blueprint.transformer {
        stages.push(stage_info("transformer", transformer));
    }
    if let Some(ref formatter) = blueprint.format.formatter {
        stages.push(stage_info("formatter", formatter));
    }
    if let Some(ref batch) = blueprint.batch {
        stages.push(stage_info("batch formatter", &batch.formatter));
    }

    let registered = args.stages.then(|| {
        let names = Registry::with_builtins().names();
        RegisteredInfo {
            routers: names.routers,
            transformers: names.transformers,
            formatters: names.formatters,
            batch_formatters: names.batch_formatters,
        }
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        destination: DestinationInfo {
            kind: destination.kind.to_string(),
            fields,
            ignore_errors: destination.ignore_errors.clone(),
        },
        stages,
        payload_format: format!("{:?}", blueprint.format.payload_format),
        batch: blueprint.batch.as_ref().map(|b| BatchInfo {
            max_size: b.max_size,
            linger_ms: b.linger_ms,
            formatter: b.formatter.name.clone(),
            key: b.key.to_string(),
        }),
        workers: blueprint.dispatch.workers,
        queue_capacity: blueprint.dispatch.queue_capacity,
        registered,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               CDC Outbound Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📤 Destination");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Type: {}", info.destination.kind);
    if !info.destination.ignore_errors.is_empty() {
        println!("   ├─ Ignored errors: {:?}", info.destination.ignore_errors);
    }
    if info.destination.fields.is_empty() {
        println!("   └─ Dynamic fields: (none)");
    } else {
        println!("   └─ Dynamic fields ({}):", info.destination.fields.len());
        for (i, field) in info.destination.fields.iter().enumerate() {
            let prefix = if i == info.destination.fields.len() - 1 { "└─" } else { "├─" };
            println!("        {} {} = {}", prefix, field.path, field.source);
        }
    }

    println!("\n🔀 Stages ({})", info.stages.len());
    for (i, stage) in info.stages.iter().enumerate() {
        let prefix = if i == info.stages.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {}: {} ({} params)",
            prefix, stage.kind, stage.name, stage.params
        );
    }

    println!("\n⚙️  Dispatch");
    println!("   ├─ Payload format: {}", info.payload_format);
    if let Some(ref batch) = info.batch {
        println!(
            "   ├─ Batch: max {} records, linger {} ms, key {}",
            batch.max_size, batch.linger_ms, batch.key
        );
    }
    println!("   ├─ Workers: {}", info.workers);
    println!("   └─ Queue capacity: {}", info.queue_capacity);

    if let Some(ref registered) = info.registered {
        println!("\n📚 Registered stages");
        println!("   ├─ Routers: {}", registered.routers.join(", "));
        println!("   ├─ Transformers: {}", registered.transformers.join(", "));
        println!("   ├─ Formatters: {}", registered.formatters.join(", "));
        println!("   └─ Batch formatters: {}", registered.batch_formatters.join(", "));
    }

    println!();
}
