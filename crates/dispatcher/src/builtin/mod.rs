//! Built-in stages
//!
//! Registered by name in [`crate::Registry::with_builtins`].

pub mod formatters;
pub mod routers;
pub mod transformers;

pub use formatters::{
    GenerationSkipFormatter, KeyValueFormatter, MessageTypeFormatter, WrapBuiltinJsonFormatter,
    WriteJsonBatchFormatter,
};
pub use routers::{BinValueRouter, GenerationRouter, GenerationSkipRouter, StaticRouter};
pub use transformers::{GenerationSkipTransformer, RecordTransformer};

/// Generation strictly above the threshold; records without one count as young
pub(crate) fn is_older_than(generation: Option<u32>, gen_number: u64) -> bool {
    generation.is_some_and(|g| u64::from(g) > gen_number)
}
