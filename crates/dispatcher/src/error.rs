//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// All of these surface at startup; per-record failures become a
/// `RecordOutcome` instead.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Stage name not present in the registry
    #[error("unknown {kind} '{name}'")]
    UnknownStage { kind: &'static str, name: String },

    /// Stage constructor rejected its parameters
    #[error("failed to create {kind} '{name}': {message}")]
    StageConstruction {
        kind: &'static str,
        name: String,
        message: String,
    },

    /// Transport creation error
    #[error("failed to create transport '{name}': {message}")]
    TransportCreation { name: String, message: String },

    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn unknown_stage(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownStage {
            kind,
            name: name.into(),
        }
    }

    pub fn stage_construction(
        kind: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StageConstruction {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a transport creation error
    pub fn transport_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
