//! Dispatch run orchestration module.

mod orchestrator;
mod recording;
mod stats;

pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use stats::RunStats;
