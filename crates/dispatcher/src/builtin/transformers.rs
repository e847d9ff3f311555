//! Built-in transformers

use serde_json::{Map, Value};

use contracts::{
    BinValue, ChangeNotificationRecord, ContractError, StageConfig, Transformed, Transformer,
};

use super::is_older_than;

/// Drops records above a generation threshold
#[derive(Debug, Clone)]
pub struct GenerationSkipTransformer {
    gen_number: u64,
}

impl GenerationSkipTransformer {
    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self {
            gen_number: config.require_u64("gen-number")?,
        })
    }
}

impl Transformer for GenerationSkipTransformer {
    fn transform(&self, record: ChangeNotificationRecord) -> Result<Transformed, ContractError> {
        if is_older_than(record.generation(), self.gen_number) {
            return Ok(Transformed::Skip);
        }
        Ok(Transformed::Record(record))
    }
}

/// Bumps the generation and merges configured bins into the record
#[derive(Debug, Clone, Default)]
pub struct RecordTransformer {
    extra_bins: Map<String, Value>,
}

impl RecordTransformer {
    pub fn new(extra_bins: Map<String, Value>) -> Self {
        Self { extra_bins }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ContractError> {
        Ok(Self::new(config.object("bins")?.unwrap_or_default()))
    }
}

impl Transformer for RecordTransformer {
    fn transform(&self, record: ChangeNotificationRecord) -> Result<Transformed, ContractError> {
        let (mut metadata, mut bins) = record.into_parts();

        if let Some(generation) = metadata.generation {
            let next = generation.checked_add(1).ok_or_else(|| {
                ContractError::transform(format!("generation {generation} overflows"))
            })?;
            metadata.generation = Some(next);
        }

        for (name, value) in &self.extra_bins {
            bins.insert(name.clone(), BinValue::from(value.clone()));
        }

        Ok(Transformed::Record(ChangeNotificationRecord::new(
            metadata, bins,
        )))
    }
}
