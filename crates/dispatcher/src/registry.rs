//! Stage registry - maps configured stage names to constructors
//!
//! Names are resolved once when the pipeline is built; an unknown name or
//! rejected parameters fail startup.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    BatchFormatter, ContractError, DestinationKind, Formatter, Router, StageConfig, StageSpec,
    Transformer,
};
use tracing::debug;

use crate::builtin::{
    BinValueRouter, GenerationRouter, GenerationSkipFormatter, GenerationSkipRouter,
    GenerationSkipTransformer, KeyValueFormatter, MessageTypeFormatter, RecordTransformer,
    StaticRouter, WrapBuiltinJsonFormatter, WriteJsonBatchFormatter,
};
use crate::error::DispatcherError;

type Constructor<T> = Box<dyn Fn(&StageConfig) -> Result<Arc<T>, ContractError> + Send + Sync>;

/// Stage constructors by name
#[derive(Default)]
pub struct Registry {
    routers: HashMap<String, Constructor<dyn Router>>,
    transformers: HashMap<String, Constructor<dyn Transformer>>,
    formatters: HashMap<String, Constructor<dyn Formatter>>,
    batch_formatters: HashMap<String, Constructor<dyn BatchFormatter>>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in stage
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_router("static", |c| Ok(Arc::new(StaticRouter::from_config(c)?)));
        registry.register_router("bin-value", |c| {
            Ok(Arc::new(BinValueRouter::from_config(c)?))
        });
        registry.register_router("generation", |c| {
            Ok(Arc::new(GenerationRouter::from_config(c)?))
        });
        registry.register_router("generation-skip", |c| {
            Ok(Arc::new(GenerationSkipRouter::from_config(c)?))
        });

        registry.register_transformer("generation-skip", |c| {
            Ok(Arc::new(GenerationSkipTransformer::from_config(c)?))
        });
        registry.register_transformer("record", |c| {
            Ok(Arc::new(RecordTransformer::from_config(c)?))
        });

        registry.register_formatter("key-value", |c| {
            Ok(Arc::new(KeyValueFormatter::from_config(c)?))
        });
        registry.register_formatter("wrap-builtin-json", |_| Ok(Arc::new(WrapBuiltinJsonFormatter)));
        registry.register_formatter("generation-skip", |c| {
            Ok(Arc::new(GenerationSkipFormatter::from_config(c)?))
        });
        registry.register_formatter("message-type", |c| {
            Ok(Arc::new(MessageTypeFormatter::from_config(c)?))
        });

        registry.register_batch_formatter("write-json", |_| Ok(Arc::new(WriteJsonBatchFormatter)));

        registry
    }

    pub fn register_router<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&StageConfig) -> Result<Arc<dyn Router>, ContractError> + Send + Sync + 'static,
    {
        self.routers.insert(name.into(), Box::new(constructor));
    }

    pub fn register_transformer<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&StageConfig) -> Result<Arc<dyn Transformer>, ContractError> + Send + Sync + 'static,
    {
        self.transformers.insert(name.into(), Box::new(constructor));
    }

    pub fn register_formatter<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&StageConfig) -> Result<Arc<dyn Formatter>, ContractError> + Send + Sync + 'static,
    {
        self.formatters.insert(name.into(), Box::new(constructor));
    }

    pub fn register_batch_formatter<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&StageConfig) -> Result<Arc<dyn BatchFormatter>, ContractError>
            + Send
            + Sync
            + 'static,
    {
        self.batch_formatters.insert(name.into(), Box::new(constructor));
    }

    pub fn create_router(
        &self,
        spec: &StageSpec,
        destination: DestinationKind,
    ) -> Result<Arc<dyn Router>, DispatcherError> {
        create("router", &self.routers, spec, destination)
    }

    pub fn create_transformer(
        &self,
        spec: &StageSpec,
        destination: DestinationKind,
    ) -> Result<Arc<dyn Transformer>, DispatcherError> {
        create("transformer", &self.transformers, spec, destination)
    }

    pub fn create_formatter(
        &self,
        spec: &StageSpec,
        destination: DestinationKind,
    ) -> Result<Arc<dyn Formatter>, DispatcherError> {
        create("formatter", &self.formatters, spec, destination)
    }

    pub fn create_batch_formatter(
        &self,
        spec: &StageSpec,
        destination: DestinationKind,
    ) -> Result<Arc<dyn BatchFormatter>, DispatcherError> {
        create("batch formatter", &self.batch_formatters, spec, destination)
    }

    /// Registered names per stage kind, sorted
    pub fn names(&self) -> RegisteredStages {
        fn sorted<T: ?Sized>(map: &HashMap<String, Constructor<T>>) -> Vec<String> {
            let mut names: Vec<String> = map.keys().cloned().collect();
            names.sort();
            names
        }

        RegisteredStages {
            routers: sorted(&self.routers),
            transformers: sorted(&self.transformers),
            formatters: sorted(&self.formatters),
            batch_formatters: sorted(&self.batch_formatters),
        }
    }
}

/// Stage names known to a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredStages {
    pub routers: Vec<String>,
    pub transformers: Vec<String>,
    pub formatters: Vec<String>,
    pub batch_formatters: Vec<String>,
}

fn create<T: ?Sized>(
    kind: &'static str,
    constructors: &HashMap<String, Constructor<T>>,
    spec: &StageSpec,
    destination: DestinationKind,
) -> Result<Arc<T>, DispatcherError> {
    let constructor = constructors
        .get(&spec.name)
        .ok_or_else(|| DispatcherError::unknown_stage(kind, &spec.name))?;

    let config = StageConfig::new(destination, spec.params.clone());
    let stage = constructor(&config)
        .map_err(|e| DispatcherError::stage_construction(kind, &spec.name, e.to_string()))?;

    debug!(kind, name = %spec.name, destination = %destination, "stage created");
    Ok(stage)
}
