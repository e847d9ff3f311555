//! Dispatch pipeline - Router → Transformer → built-in encoding → Formatter
//!
//! Every stage error ends up in [`Disposition::from_error`], the single
//! place mapping errors to record outcomes. The pipeline holds no state
//! across records, so a redelivered record simply re-enters at routing.

use std::sync::Arc;

use contracts::{
    BatchFormatter, BatchItem, ChangeNotificationRecord, ContractError, DestinationKind,
    DynamicFieldSource, Escalation, Formatter, FormatterInput, OutboundRecord, OutboundRoute,
    PipelineBlueprint, RecordOutcome, Router, Transformed, Transformer,
};
use tracing::{debug, warn};

use crate::encoder::Encoder;
use crate::error::DispatcherError;
use crate::registry::Registry;

/// Final decision of the pipeline for one record (or one batch)
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Hand `records` to the transport for `route`
    Dispatch {
        route: OutboundRoute,
        records: Vec<OutboundRecord>,
    },
    Skipped,
    TemporaryFailure { reason: String },
    PermanentFailure { reason: String },
}

impl Disposition {
    /// Classify a stage error
    ///
    /// Resolution failures keep the class chosen by their failure strategy;
    /// any other error leads to redelivery.
    pub fn from_error(err: &ContractError) -> Self {
        let reason = err.to_string();
        match err.escalation() {
            Escalation::Temporary => Self::TemporaryFailure { reason },
            Escalation::Permanent => Self::PermanentFailure { reason },
        }
    }

    pub fn outcome(&self) -> RecordOutcome {
        match self {
            Self::Dispatch { .. } => RecordOutcome::Dispatched,
            Self::Skipped => RecordOutcome::Skipped,
            Self::TemporaryFailure { .. } => RecordOutcome::TemporaryFailure,
            Self::PermanentFailure { .. } => RecordOutcome::PermanentFailure,
        }
    }
}

/// Result of the batch preparation steps for one record
#[derive(Debug, Clone)]
pub enum Prepared {
    /// Routed, transformed and encoded; waits for its batch
    Item(BatchItem),
    /// Settled before formatting
    Done(Disposition),
}

struct BatchStage {
    formatter: Arc<dyn BatchFormatter>,
    key: DynamicFieldSource,
}

/// Per-destination dispatch pipeline
///
/// Shared by all workers; stages are called concurrently.
pub struct Pipeline {
    destination: DestinationKind,
    router: Arc<dyn Router>,
    transformer: Option<Arc<dyn Transformer>>,
    formatter: Option<Arc<dyn Formatter>>,
    batch: Option<BatchStage>,
    encoder: Encoder,
}

impl Pipeline {
    pub fn new(router: Arc<dyn Router>, encoder: Encoder) -> Self {
        Self {
            destination: encoder.destination().kind,
            router,
            transformer: None,
            formatter: None,
            batch: None,
            encoder,
        }
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Enable batch formatting, `key` computes the batch record key
    pub fn with_batch_formatter(
        mut self,
        formatter: Arc<dyn BatchFormatter>,
        key: DynamicFieldSource,
    ) -> Self {
        self.batch = Some(BatchStage { formatter, key });
        self
    }

    /// Build from a validated blueprint, resolving stage names once
    pub fn from_blueprint(
        blueprint: &PipelineBlueprint,
        registry: &Registry,
    ) -> Result<Self, DispatcherError> {
        let kind = blueprint.destination.kind;
        let encoder = Encoder::new(
            blueprint.destination.clone(),
            blueprint.format.payload_format,
        );

        let mut pipeline = Self::new(registry.create_router(&blueprint.routing, kind)?, encoder);

        if let Some(spec) = &blueprint.transformer {
            pipeline = pipeline.with_transformer(registry.create_transformer(spec, kind)?);
        }
        if let Some(spec) = &blueprint.format.formatter {
            pipeline = pipeline.with_formatter(registry.create_formatter(spec, kind)?);
        }
        if let Some(batch) = &blueprint.batch {
            pipeline = pipeline.with_batch_formatter(
                registry.create_batch_formatter(&batch.formatter, kind)?,
                batch.key.clone(),
            );
        }
        Ok(pipeline)
    }

    pub fn destination(&self) -> DestinationKind {
        self.destination
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    /// Run one record through every stage
    pub fn process(&self, record: ChangeNotificationRecord) -> Disposition {
        let key = record.key().to_string();

        let item = match self.prepare(record) {
            Prepared::Item(item) => item,
            Prepared::Done(disposition) => return disposition,
        };

        let disposition = match &self.formatter {
            Some(formatter) => {
                let route = item.route.clone();
                let input = FormatterInput {
                    record: item.record,
                    formatted_record: item.formatted_record,
                    route: item.route,
                };
                match formatter.format(input) {
                    Ok(out) if out.is_skip() => Disposition::Skipped,
                    Ok(out) => Disposition::Dispatch {
                        route,
                        records: vec![out],
                    },
                    Err(e) => self.fail("formatter", &key, &e),
                }
            }
            None if item.formatted_record.has_payload() => Disposition::Dispatch {
                route: item.route,
                records: vec![item.formatted_record],
            },
            None => self.fail(
                "formatter",
                &key,
                &ContractError::format("no formatter and no built-in payload format configured"),
            ),
        };

        debug!(key = %key, outcome = %disposition.outcome(), "record processed");
        disposition
    }

    /// Route, transform and encode one record
    pub fn prepare(&self, record: ChangeNotificationRecord) -> Prepared {
        let key = record.key().to_string();

        let route = match self.router.route(&record) {
            Ok(route) if route.is_skip() => {
                debug!(key = %key, stage = "router", "record skipped");
                return Prepared::Done(Disposition::Skipped);
            }
            Ok(route) => route,
            Err(e) => return Prepared::Done(self.fail("router", &key, &e)),
        };

        let record = match &self.transformer {
            None => record,
            Some(transformer) => match transformer.transform(record) {
                Ok(Transformed::Record(record)) => record,
                Ok(Transformed::Skip) => {
                    debug!(key = %key, stage = "transformer", "record skipped");
                    return Prepared::Done(Disposition::Skipped);
                }
                Err(e) => return Prepared::Done(self.fail("transformer", &key, &e)),
            },
        };

        match self.encoder.encode(&record) {
            Ok(formatted_record) => Prepared::Item(BatchItem {
                record,
                formatted_record,
                route,
            }),
            Err(e) => Prepared::Done(self.fail("encoder", &key, &e)),
        }
    }

    /// Format one batch; the result applies to every item
    pub fn format_batch(&self, items: Vec<BatchItem>) -> Disposition {
        let Some(batch) = &self.batch else {
            return Disposition::TemporaryFailure {
                reason: "no batch formatter configured".to_string(),
            };
        };
        let Some(route) = items.first().map(|item| item.route.clone()) else {
            return Disposition::Skipped;
        };

        let size = items.len();
        observability::record_batch(self.destination.as_str(), size);
        let records: Vec<ChangeNotificationRecord> =
            items.iter().map(|item| item.record.clone()).collect();

        let formatted = match batch.formatter.format(items) {
            Ok(formatted) => formatted,
            Err(e) => {
                warn!(route = %route, size, error = %e, "batch formatter failed");
                return Disposition::TemporaryFailure {
                    reason: e.to_string(),
                };
            }
        };

        let formatted: Vec<OutboundRecord> =
            formatted.into_iter().filter(|r| !r.is_skip()).collect();
        if formatted.is_empty() {
            debug!(route = %route, size, "batch produced nothing to send");
            return Disposition::Skipped;
        }

        let formatted = match self.apply_batch_key(&batch.key, &records, formatted) {
            Ok(formatted) => formatted,
            Err(e) => {
                warn!(route = %route, size, error = %e, "batch key resolution failed");
                return Disposition::from_error(&e);
            }
        };

        debug!(route = %route, size, records = formatted.len(), "batch formatted");
        Disposition::Dispatch {
            route,
            records: formatted,
        }
    }

    fn apply_batch_key(
        &self,
        key: &DynamicFieldSource,
        records: &[ChangeNotificationRecord],
        formatted: Vec<OutboundRecord>,
    ) -> Result<Vec<OutboundRecord>, ContractError> {
        if !matches!(
            self.destination,
            DestinationKind::Kafka | DestinationKind::Pulsar
        ) {
            return Ok(formatted);
        }
        // none/auto/system-default leave the key to the destination
        let value = field_resolver::resolve_batch(key, records)?;

        Ok(formatted
            .into_iter()
            .map(|record| with_metadata_key(record, value.as_ref()))
            .collect())
    }

    fn fail(&self, stage: &'static str, key: &str, err: &ContractError) -> Disposition {
        let disposition = Disposition::from_error(err);
        warn!(
            key,
            stage,
            outcome = %disposition.outcome(),
            error = %err,
            "stage failed"
        );
        disposition
    }
}

fn with_metadata_key(record: OutboundRecord, key: Option<&contracts::FieldValue>) -> OutboundRecord {
    match record {
        OutboundRecord::Bytes(mut r) => {
            r.metadata = r.metadata.with_key(key.cloned());
            OutboundRecord::Bytes(r)
        }
        OutboundRecord::Text(mut r) => {
            r.metadata = r.metadata.with_key(key.cloned());
            OutboundRecord::Text(r)
        }
        skip @ OutboundRecord::Skip(_) => skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use contracts::{
        BinValue, ChangeNotificationMetadata, DestinationConfig, Digest, FailureStrategy,
        FieldValue, Key, MediaType, Operation, PayloadFormat, ResolutionFailure,
    };

    use crate::builtin::{StaticRouter, WriteJsonBatchFormatter};

    struct FailingRouter;

    impl Router for FailingRouter {
        fn route(&self, _: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
            Err(ContractError::routing("boom"))
        }
    }

    struct SkipRouter;

    impl Router for SkipRouter {
        fn route(&self, _: &ChangeNotificationRecord) -> Result<OutboundRoute, ContractError> {
            Ok(OutboundRoute::skip())
        }
    }

    struct SkipTransformer;

    impl Transformer for SkipTransformer {
        fn transform(&self, _: ChangeNotificationRecord) -> Result<Transformed, ContractError> {
            Ok(Transformed::Skip)
        }
    }

    #[derive(Default)]
    struct CountingFormatter {
        calls: AtomicUsize,
    }

    impl Formatter for CountingFormatter {
        fn format(&self, input: FormatterInput) -> Result<OutboundRecord, ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.formatted_record)
        }
    }

    struct IgnoringFormatter;

    impl Formatter for IgnoringFormatter {
        fn format(&self, _: FormatterInput) -> Result<OutboundRecord, ContractError> {
            Err(ResolutionFailure::new("bin-value", "missing", Escalation::Permanent).into())
        }
    }

    struct FailingBatchFormatter;

    impl BatchFormatter for FailingBatchFormatter {
        fn format(&self, _: Vec<BatchItem>) -> Result<Vec<OutboundRecord>, ContractError> {
            Err(ContractError::format("batch boom"))
        }
    }

    fn record(digest: u8, operation: Operation) -> ChangeNotificationRecord {
        let key = Key::new("test", Some("s".into()), Digest::new([digest; 20]));
        ChangeNotificationRecord::new(
            ChangeNotificationMetadata::new(key, operation),
            [("name", BinValue::from("alice"))],
        )
    }

    fn encoder(kind: DestinationKind) -> Encoder {
        Encoder::new(DestinationConfig::new(kind), PayloadFormat::Json)
    }

    fn static_pipeline(kind: DestinationKind) -> Pipeline {
        Pipeline::new(
            Arc::new(StaticRouter::new(OutboundRoute::kafka("t"))),
            encoder(kind),
        )
    }

    #[test]
    fn test_baseline_dispatch_without_formatter() {
        let disposition = static_pipeline(DestinationKind::Kafka).process(record(1, Operation::Write));
        let Disposition::Dispatch { route, records } = disposition else {
            panic!("expected dispatch, got {disposition:?}");
        };
        assert_eq!(route, OutboundRoute::kafka("t"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].media_type(), MediaType::Json);
    }

    #[test]
    fn test_router_error_is_temporary() {
        let pipeline = Pipeline::new(Arc::new(FailingRouter), encoder(DestinationKind::Kafka));
        assert_eq!(
            pipeline.process(record(1, Operation::Write)).outcome(),
            RecordOutcome::TemporaryFailure
        );
    }

    #[test]
    fn test_skip_route_never_reaches_formatter() {
        let formatter = Arc::new(CountingFormatter::default());
        let pipeline = Pipeline::new(Arc::new(SkipRouter), encoder(DestinationKind::Kafka))
            .with_formatter(formatter.clone());

        for i in 0..5 {
            assert_eq!(
                pipeline.process(record(i, Operation::Write)),
                Disposition::Skipped
            );
        }
        assert_eq!(formatter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_transformer_skip() {
        let formatter = Arc::new(CountingFormatter::default());
        let pipeline = static_pipeline(DestinationKind::Kafka)
            .with_transformer(Arc::new(SkipTransformer))
            .with_formatter(formatter.clone());

        assert_eq!(
            pipeline.process(record(1, Operation::Write)),
            Disposition::Skipped
        );
        assert_eq!(formatter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_permanent_resolution_failure_from_formatter() {
        let pipeline =
            static_pipeline(DestinationKind::Kafka).with_formatter(Arc::new(IgnoringFormatter));
        assert_eq!(
            pipeline.process(record(1, Operation::Write)).outcome(),
            RecordOutcome::PermanentFailure
        );
    }

    #[test]
    fn test_encoder_resolution_failure_escalates() {
        let mut destination = DestinationConfig::new(DestinationKind::Kafka);
        destination.key = DynamicFieldSource::bin_value("missing", FailureStrategy::Fail);
        let pipeline = Pipeline::new(
            Arc::new(StaticRouter::new(OutboundRoute::kafka("t"))),
            Encoder::new(destination, PayloadFormat::Json),
        );
        assert_eq!(
            pipeline.process(record(1, Operation::Write)).outcome(),
            RecordOutcome::TemporaryFailure
        );
    }

    fn prepared_items(pipeline: &Pipeline, records: Vec<ChangeNotificationRecord>) -> Vec<BatchItem> {
        records
            .into_iter()
            .map(|r| match pipeline.prepare(r) {
                Prepared::Item(item) => item,
                Prepared::Done(d) => panic!("unexpected {d:?}"),
            })
            .collect()
    }

    #[test]
    fn test_batch_formatter_error_fails_whole_batch() {
        let pipeline = static_pipeline(DestinationKind::Kafka)
            .with_batch_formatter(Arc::new(FailingBatchFormatter), DynamicFieldSource::None);
        let items = prepared_items(
            &pipeline,
            (0..4).map(|i| record(i, Operation::Write)).collect(),
        );

        let disposition = pipeline.format_batch(items);
        assert_eq!(disposition.outcome(), RecordOutcome::TemporaryFailure);
    }

    #[test]
    fn test_batch_of_deletes_is_skipped() {
        let pipeline = static_pipeline(DestinationKind::Kafka)
            .with_batch_formatter(Arc::new(WriteJsonBatchFormatter), DynamicFieldSource::None);
        let items = prepared_items(
            &pipeline,
            vec![record(1, Operation::Delete), record(2, Operation::Delete)],
        );
        assert_eq!(pipeline.format_batch(items), Disposition::Skipped);
    }

    #[test]
    fn test_batch_key_applied_for_kafka() {
        let pipeline = static_pipeline(DestinationKind::Kafka)
            .with_batch_formatter(Arc::new(WriteJsonBatchFormatter), DynamicFieldSource::KeyConcat);
        let items = prepared_items(
            &pipeline,
            vec![record(1, Operation::Write), record(2, Operation::Write)],
        );

        let Disposition::Dispatch { records, .. } = pipeline.format_batch(items) else {
            panic!("expected dispatch");
        };
        let Some(FieldValue::Bytes(key)) = records[0].metadata().key() else {
            panic!("expected a bytes key");
        };
        assert_eq!(key.len(), 40);
    }

    struct KeepAllBatchFormatter;

    impl BatchFormatter for KeepAllBatchFormatter {
        fn format(&self, items: Vec<BatchItem>) -> Result<Vec<OutboundRecord>, ContractError> {
            Ok(items.into_iter().map(|item| item.formatted_record).collect())
        }
    }

    fn keyed_pipeline(batch_key: DynamicFieldSource, formatter: Arc<dyn BatchFormatter>) -> Pipeline {
        let mut destination = DestinationConfig::new(DestinationKind::Kafka);
        destination.key = DynamicFieldSource::bin_value("id", FailureStrategy::Fail);
        Pipeline::new(
            Arc::new(StaticRouter::new(OutboundRoute::kafka("t"))),
            Encoder::new(destination, PayloadFormat::Json),
        )
        .with_batch_formatter(formatter, batch_key)
    }

    fn keyed_record(digest: u8) -> ChangeNotificationRecord {
        let key = Key::new("test", Some("s".into()), Digest::new([digest; 20]));
        ChangeNotificationRecord::new(
            ChangeNotificationMetadata::new(key, Operation::Write),
            [("id", BinValue::from(digest.to_string()))],
        )
    }

    #[test]
    fn test_unset_batch_key_does_not_inherit_member_key() {
        for batch_key in [
            DynamicFieldSource::None,
            DynamicFieldSource::Auto,
            DynamicFieldSource::SystemDefault,
        ] {
            for formatter in [
                Arc::new(WriteJsonBatchFormatter) as Arc<dyn BatchFormatter>,
                Arc::new(KeepAllBatchFormatter) as Arc<dyn BatchFormatter>,
            ] {
                let pipeline = keyed_pipeline(batch_key.clone(), formatter);
                let items = prepared_items(&pipeline, (1..=3).map(keyed_record).collect());
                assert_eq!(
                    items[0].formatted_record.metadata().key(),
                    Some(&FieldValue::from("1"))
                );

                let Disposition::Dispatch { records, .. } = pipeline.format_batch(items) else {
                    panic!("expected dispatch");
                };
                assert!(records.iter().all(|r| r.metadata().key().is_none()));
            }
        }
    }
}
