//! RecordOutcome - acknowledgment sent upstream per record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final state of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordOutcome {
    Dispatched,
    Skipped,
    /// NACK, the source redelivers the record
    TemporaryFailure,
    /// Acknowledged as handled but never dispatched
    PermanentFailure,
}

impl RecordOutcome {
    pub const ALL: [RecordOutcome; 4] = [
        Self::Dispatched,
        Self::Skipped,
        Self::TemporaryFailure,
        Self::PermanentFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Skipped => "skipped",
            Self::TemporaryFailure => "temp_failed",
            Self::PermanentFailure => "perm_failed",
        }
    }

    pub fn is_redelivered(self) -> bool {
        self == Self::TemporaryFailure
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
