//! Outbound Pipeline Example
//!
//! Generates synthetic change notifications and dispatches them to a
//! Kafka-shaped destination, logging every delivery. Records in the
//! `internal` region go to one topic, the rest to another; every fifth
//! record is a delete.
//!
//! Run with: cargo run --bin outbound_pipeline [config.toml]

use std::sync::Arc;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{
    BinValue, ChangeNotificationMetadata, ChangeNotificationRecord, Digest, Key, Operation,
    PipelineBlueprint, UserKey,
};
use dispatcher::{LogTransport, Notification, Registry, create_dispatcher};
use observability::{LogFormat, ObservabilityConfig, OutcomeAggregator};

const DEFAULT_CONFIG: &str = r#"
[destination]
type = "kafka"
key = { source = "user-key", failure-strategy = "use-digest" }
ignore-errors = ["409"]

[routing]
name = "bin-value"
params = { bin = "region", value = "internal", match-route = "internal-events", default-route = "external-events" }

[transformer]
name = "record"
params = { bins = { pipeline = "demo" } }

[format]
payload-format = "json"
formatter = { name = "wrap-builtin-json" }

[dispatch]
workers = 2
queue-capacity = 64
"#;

const RECORD_COUNT: u8 = 20;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        ..Default::default()
    })?;

    tracing::info!("Starting Outbound Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint: PipelineBlueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading pipeline config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        ConfigLoader::load_from_str(DEFAULT_CONFIG, ConfigFormat::Toml)?
    };

    // ==== Stage 2: Build dispatcher ====
    let (input_tx, input_rx) = async_channel::bounded(blueprint.dispatch.queue_capacity);
    let dispatcher = create_dispatcher(
        &blueprint,
        &Registry::with_builtins(),
        LogTransport::new("demo"),
        input_rx,
    )?;
    let metrics = Arc::clone(dispatcher.metrics());
    let dispatcher_handle = dispatcher.spawn();

    // ==== Stage 3: Feed synthetic change notifications ====
    let mut acks = Vec::with_capacity(RECORD_COUNT as usize);
    for i in 0..RECORD_COUNT {
        let (notification, ack) = Notification::with_ack(synthetic_record(i));
        input_tx.send(notification).await?;
        acks.push(ack);
    }
    input_tx.close();

    // ==== Stage 4: Collect outcomes ====
    let mut aggregator = OutcomeAggregator::new();
    for ack in acks {
        aggregator.record_outcome(ack.await?);
    }
    dispatcher_handle.await?;

    println!("\n{}", aggregator.summary());
    tracing::info!(
        batches = metrics.batches(),
        settled = metrics.snapshot().settled(),
        "Demo finished"
    );

    Ok(())
}

fn synthetic_record(i: u8) -> ChangeNotificationRecord {
    let key = Key::new("demo", Some("users".into()), Digest::new([i; 20]))
        .with_user_key(UserKey::Integer(i64::from(i)));
    let operation = if i % 5 == 4 {
        Operation::Delete
    } else {
        Operation::Write
    };

    let mut metadata = ChangeNotificationMetadata::new(key, operation);
    metadata.generation = Some(u32::from(i) + 1);
    metadata.last_update_time_ms = Some(1_700_000_000_000 + u64::from(i) * 1000);

    let region = if i % 3 == 0 { "internal" } else { "west" };
    ChangeNotificationRecord::new(
        metadata,
        [
            ("region", BinValue::from(region)),
            ("name", BinValue::from(format!("user-{i}"))),
            ("visits", BinValue::Integer(i64::from(i) * 7)),
        ],
    )
}
