//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载与启动校验
//! - 分发流水线的结果语义（每条记录恰好一个结果）
//! - 端到端分发（配置 → Dispatcher → Transport）

#[cfg(test)]
mod support {
    use contracts::{
        BinValue, ChangeNotificationMetadata, ChangeNotificationRecord, Digest, Key, Operation,
        PipelineBlueprint,
    };

    pub fn record(
        digest: u8,
        operation: Operation,
        bins: Vec<(&str, BinValue)>,
    ) -> ChangeNotificationRecord {
        let key = Key::new("test", Some("users".into()), Digest::new([digest; 20]));
        let mut metadata = ChangeNotificationMetadata::new(key, operation);
        metadata.generation = Some(1);
        ChangeNotificationRecord::new(metadata, bins)
    }

    pub fn blueprint(toml: &str) -> PipelineBlueprint {
        config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
            .unwrap()
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_blank_static_value_fails_before_any_record() {
        let toml = r#"
            [destination]
            type = "kafka"
            key = { source = "static", value = "" }

            [routing]
            name = "static"
            params = { route = "users" }
        "#;

        let err = ConfigLoader::load_from_str(toml, ConfigFormat::Toml)
            .unwrap_err()
            .to_string();
        assert!(err.contains("value cannot be blank"), "got: {err}");
    }

    #[test]
    fn test_key_hash_for_single_record_key_rejected_at_load() {
        let toml = r#"
            [destination]
            type = "kafka"
            key = { source = "key-hash" }

            [routing]
            name = "static"
            params = { route = "users" }
        "#;

        let err = ConfigLoader::load_from_str(toml, ConfigFormat::Toml)
            .unwrap_err()
            .to_string();
        assert!(err.contains("destination.key"), "got: {err}");
        assert!(err.contains("only allowed for batch keys"), "got: {err}");
    }

    #[test]
    fn test_full_blueprint_loads() {
        let toml = r#"
            version = "v1"

            [destination]
            type = "elasticsearch"
            doc-id = { source = "user-key", failure-strategy = "use-digest" }
            routing = { source = "bin-value", bin-name = "tenant", failure-strategy = "ignore" }
            ignore-errors = ["409"]

            [routing]
            name = "generation"
            params = { gen-number = 10, old-route = "archive", young-route = "live" }

            [transformer]
            name = "record"
            params = { bins = { origin = "cdc" } }

            [format]
            payload-format = "flat-json"
            formatter = { name = "message-type", params = { as-text = true } }

            [dispatch]
            workers = 2
            queue-capacity = 16
        "#;

        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.destination.ignore_errors, vec!["409"]);
        assert_eq!(blueprint.dispatch.workers, 2);
        assert!(blueprint.batch.is_none());

        // Survives a JSON round trip through the loader
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded.routing.name, "generation");
        assert_eq!(reloaded.destination.routing, blueprint.destination.routing);
    }
}

#[cfg(test)]
mod resolver_tests {
    use contracts::{
        BinValue, DynamicFieldSource, FailureStrategy, FieldValue, Operation,
    };

    use crate::support::record;

    #[test]
    fn test_missing_bin_with_use_digest_is_stable() {
        let source = DynamicFieldSource::bin_value("missing", FailureStrategy::UseDigest);
        let rec = record(9, Operation::Write, vec![("other", BinValue::Integer(1))]);

        let first = field_resolver::resolve(&source, &rec).unwrap();
        let second = field_resolver::resolve(&source, &rec).unwrap();

        assert_eq!(first, Some(FieldValue::Bytes(vec![9u8; 20].into())));
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use contracts::{
        BinValue, ChangeNotificationRecord, ContractError, DestinationConfig, DestinationKind,
        Formatter, FormatterInput, Operation, OutboundRecord, OutboundRoute, PayloadFormat,
        RouteType, Transformed, Transformer,
    };
    use dispatcher::builtin::StaticRouter;
    use dispatcher::{Disposition, Encoder, Pipeline, Registry};

    use crate::support::{blueprint, record};

    struct CountingFormatter {
        calls: Arc<AtomicUsize>,
    }

    impl Formatter for CountingFormatter {
        fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.formatted_record)
        }
    }

    #[test]
    fn test_region_routing_scenario() {
        let bp = blueprint(
            r#"
            [destination]
            type = "esp"
            esp = { path = "/events" }

            [routing]
            name = "bin-value"
            params = { bin = "region", value = "internal", match-route = "internal", default-route = "external" }
            "#,
        );
        let pipeline = Pipeline::from_blueprint(&bp, &Registry::with_builtins()).unwrap();

        let route_of = |region: &str| match pipeline.process(record(
            1,
            Operation::Write,
            vec![("region", BinValue::from(region))],
        )) {
            Disposition::Dispatch { route, .. } => route,
            other => panic!("expected dispatch, got {other:?}"),
        };

        let internal = route_of("internal");
        assert_eq!(internal.route_type, RouteType::Other);
        assert_eq!(internal.name(), "internal");

        let west = route_of("west");
        assert_eq!(west.route_type, RouteType::Other);
        assert_eq!(west.name(), "external");
    }

    #[test]
    fn test_skip_route_never_invokes_formatter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::with_builtins();
        let registered = Arc::clone(&calls);
        registry.register_formatter("counting", move |_| {
            Ok(Arc::new(CountingFormatter {
                calls: Arc::clone(&registered),
            }))
        });

        let bp = blueprint(
            r#"
            [destination]
            type = "kafka"

            [routing]
            name = "generation-skip"
            params = { gen-number = 0, route = "users" }

            [format]
            formatter = { name = "counting" }
            "#,
        );
        let pipeline = Pipeline::from_blueprint(&bp, &registry).unwrap();

        for i in 0..20 {
            let disposition = pipeline.process(record(i, Operation::Write, vec![]));
            assert_eq!(disposition, Disposition::Skipped);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct IdentityTransformer;

    impl Transformer for IdentityTransformer {
        fn transform(&self, record: ChangeNotificationRecord) -> Result<Transformed, ContractError> {
            Ok(Transformed::Record(record))
        }
    }

    struct CapturingFormatter {
        seen: Mutex<Vec<ChangeNotificationRecord>>,
    }

    impl Formatter for CapturingFormatter {
        fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
            self.seen.lock().unwrap().push(input.record);
            Ok(input.formatted_record)
        }
    }

    #[test]
    fn test_identity_transformer_round_trip() {
        let formatter = Arc::new(CapturingFormatter {
            seen: Mutex::new(Vec::new()),
        });
        let pipeline = Pipeline::new(
            Arc::new(StaticRouter::new(OutboundRoute::kafka("users"))),
            Encoder::new(DestinationConfig::new(DestinationKind::Kafka), PayloadFormat::Json),
        )
        .with_transformer(Arc::new(IdentityTransformer))
        .with_formatter(formatter.clone());

        let mut original = record(
            4,
            Operation::Write,
            vec![
                ("name", BinValue::from("alice")),
                ("score", BinValue::Double(1.5)),
                ("blob", BinValue::blob(vec![0u8, 1, 2])),
            ],
        );
        let mut metadata = original.metadata().clone();
        metadata.expiry_time = Some(0);
        metadata.last_update_time_ms = Some(1_700_000_000_000);
        original = original.with_metadata(metadata);

        let disposition = pipeline.process(original.clone());
        assert!(matches!(disposition, Disposition::Dispatch { .. }));

        let seen = formatter.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[original]);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use contracts::{
        BatchFormatter, BatchItem, BinValue, ChangeNotificationRecord, ContractError, Operation,
        OutboundRecord, OutboundRoute, RecordOutcome, Router,
    };
    use dispatcher::{
        FileTransport, LogTransport, Notification, Registry, create_dispatcher,
    };
    use serde_json::Value;
    use tempfile::tempdir;
    use tokio::sync::oneshot;

    use crate::support::{blueprint, record};

    /// Digest byte mod 4: 0 skip, 1 router error, 2 and 3 routed
    struct MixedRouter;

    impl Router for MixedRouter {
        fn route(&self, record: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
            match record.digest().as_bytes()[0] % 4 {
                0 => Ok(OutboundRoute::skip()),
                1 => Err(ContractError::routing("unroutable")),
                _ => Ok(OutboundRoute::kafka("users")),
            }
        }
    }

    struct ExplodingBatchFormatter;

    impl BatchFormatter for ExplodingBatchFormatter {
        fn format(&self, _: Vec<BatchItem>) -> Result<Vec<OutboundRecord>, ContractError> {
            Err(ContractError::format("cannot encode batch"))
        }
    }

    async fn feed(
        input_tx: async_channel::Sender<Notification>,
        records: Vec<ChangeNotificationRecord>,
    ) -> Vec<oneshot::Receiver<RecordOutcome>> {
        let mut acks = Vec::new();
        for record in records {
            let (notification, ack) = Notification::with_ack(record);
            input_tx.send(notification).await.unwrap();
            acks.push(ack);
        }
        input_tx.close();
        acks
    }

    async fn outcomes(acks: Vec<oneshot::Receiver<RecordOutcome>>) -> Vec<RecordOutcome> {
        let mut outcomes = Vec::new();
        for ack in acks {
            outcomes.push(ack.await.unwrap());
        }
        outcomes
    }

    /// Every record settles exactly once with the outcome its path implies
    #[tokio::test]
    async fn test_exactly_one_outcome_per_record() {
        let mut registry = Registry::with_builtins();
        registry.register_router("mixed", |_| Ok(Arc::new(MixedRouter)));

        let bp = blueprint(
            r#"
            [destination]
            type = "kafka"
            key = { source = "bin-value", bin-name = "id", failure-strategy = "ignore" }

            [routing]
            name = "mixed"

            [dispatch]
            workers = 4
            queue-capacity = 64
            "#,
        );

        let (input_tx, input_rx) = async_channel::bounded(8);
        let dispatcher =
            create_dispatcher(&bp, &registry, LogTransport::new("log"), input_rx).unwrap();
        let metrics = Arc::clone(dispatcher.metrics());
        let task = dispatcher.spawn();

        // Digest % 4 == 3 lacks the key bin and is dropped permanently
        let records: Vec<ChangeNotificationRecord> = (0..40u8)
            .map(|i| {
                let bins = if i % 4 == 3 {
                    vec![]
                } else {
                    vec![("id", BinValue::Integer(i as i64))]
                };
                record(i, Operation::Write, bins)
            })
            .collect();

        let acks = feed(input_tx, records).await;
        let outcomes = outcomes(acks).await;
        task.await.unwrap();

        for (i, outcome) in outcomes.iter().enumerate() {
            let expected = match i % 4 {
                0 => RecordOutcome::Skipped,
                1 => RecordOutcome::TemporaryFailure,
                2 => RecordOutcome::Dispatched,
                _ => RecordOutcome::PermanentFailure,
            };
            assert_eq!(*outcome, expected, "record {i}");
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.settled(), 40);
        assert_eq!(snapshot.dispatched, 10);
        assert_eq!(snapshot.skipped, 10);
        assert_eq!(snapshot.temporary_failures, 10);
        assert_eq!(snapshot.permanent_failures, 10);
    }

    #[tokio::test]
    async fn test_batch_formatter_error_fails_every_member() {
        let mut registry = Registry::with_builtins();
        registry.register_batch_formatter("exploding", |_| Ok(Arc::new(ExplodingBatchFormatter)));

        let bp = blueprint(
            r#"
            [destination]
            type = "pulsar"

            [routing]
            name = "static"
            params = { route = "events" }

            [batch]
            max-size = 5
            linger-ms = 60000
            formatter = { name = "exploding" }

            [dispatch]
            workers = 1
            queue-capacity = 8
            "#,
        );

        let (input_tx, input_rx) = async_channel::bounded(8);
        let dispatcher =
            create_dispatcher(&bp, &registry, LogTransport::new("log"), input_rx).unwrap();
        let metrics = Arc::clone(dispatcher.metrics());
        let task = dispatcher.spawn();

        let records = (0..5u8)
            .map(|i| record(i, Operation::Write, vec![("n", BinValue::Integer(i as i64))]))
            .collect();
        let outcomes = outcomes(feed(input_tx, records).await).await;
        task.await.unwrap();

        assert_eq!(outcomes, vec![RecordOutcome::TemporaryFailure; 5]);
        assert_eq!(metrics.batches(), 1);
    }

    /// Two writes and one delete produce one JSON document with two entries
    #[tokio::test]
    async fn test_write_json_batch_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.ndjson");

        let bp = blueprint(
            r#"
            [destination]
            type = "kafka"

            [routing]
            name = "static"
            params = { route = "users" }

            [batch]
            max-size = 3
            linger-ms = 60000
            formatter = { name = "write-json" }
            key = { source = "key-concat" }

            [dispatch]
            workers = 1
            queue-capacity = 8
            "#,
        );

        let (input_tx, input_rx) = async_channel::bounded(8);
        let transport = FileTransport::create("file", &path).unwrap();
        let dispatcher =
            create_dispatcher(&bp, &Registry::with_builtins(), transport, input_rx).unwrap();
        let task = dispatcher.spawn();

        let records = vec![
            record(1, Operation::Write, vec![("name", BinValue::from("alice"))]),
            record(2, Operation::Delete, vec![]),
            record(3, Operation::Write, vec![("name", BinValue::from("bob"))]),
        ];
        let outcomes = outcomes(feed(input_tx, records).await).await;
        task.await.unwrap();

        assert_eq!(outcomes, vec![RecordOutcome::Dispatched; 3]);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["route"], "users");

        let payload = STANDARD
            .decode(lines[0]["payload"].as_str().unwrap())
            .unwrap();
        let document: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(document.as_object().unwrap().len(), 2);

        // Batch key covers every member of the batch, deletes included
        let key = STANDARD
            .decode(lines[0]["metadata"]["key"]["value"].as_str().unwrap())
            .unwrap();
        assert_eq!(key.len(), 60);
        assert_eq!(&key[20..40], &[2u8; 20]);
    }
}
