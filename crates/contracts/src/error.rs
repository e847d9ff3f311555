//! Layered error definitions
//!
//! Categorized by when they surface: config / resolution / stage / transport

use std::fmt;

use thiserror::Error;

/// How an unresolvable dynamic field is escalated to the record outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Record is NACKed and redelivered by the change notification source
    Temporary,
    /// Record is acknowledged as handled and never redelivered
    Permanent,
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary => f.write_str("temporary"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// A dynamic field whose value could not be computed and whose failure
/// strategy did not supply a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve '{source_name}' field ({escalation}): {reason}")]
pub struct ResolutionFailure {
    /// Configured source tag (e.g. `bin-value`)
    pub source_name: String,
    /// Why the value could not be computed
    pub reason: String,
    /// Outcome class the failure escalates to
    pub escalation: Escalation,
}

impl ResolutionFailure {
    pub fn new(
        source_name: impl Into<String>,
        reason: impl Into<String>,
        escalation: Escalation,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.into(),
            escalation,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.escalation == Escalation::Permanent
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Accessor called on a variant that does not support it
    #[error("unsupported operation: {message}")]
    Capability { message: String },

    // ===== Per-record Errors =====
    /// Dynamic field resolution escalated by its failure strategy
    #[error(transparent)]
    FieldResolution(#[from] ResolutionFailure),

    /// Router failure
    #[error("routing error: {message}")]
    Routing { message: String },

    /// Transformer failure
    #[error("transform error: {message}")]
    Transform { message: String },

    /// Formatter or batch formatter failure
    #[error("format error: {message}")]
    Format { message: String },

    /// Built-in encoding failure
    #[error("encoding error: {message}")]
    Encoding { message: String },

    // ===== Transport Errors =====
    /// Transport write error
    #[error("transport '{transport}' error: {message}")]
    Transport { transport: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn capability(message: impl Into<String>) -> Self {
        Self::Capability {
            message: message.into(),
        }
    }

    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create transport write error
    pub fn transport(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Escalation class of this error when it reaches the pipeline.
    ///
    /// Only resolution failures with the `ignore` strategy are permanent;
    /// every other per-record error leads to redelivery.
    pub fn escalation(&self) -> Escalation {
        match self {
            Self::FieldResolution(failure) => failure.escalation,
            _ => Escalation::Temporary,
        }
    }
}
