//! DynamicFieldSource - declarative strategy for computing a field value
//!
//! Used for partition keys, document ids, routing keys and batch keys.
//! The capability table (which variants are legal for single-record keys
//! and which for batch keys) lives in one match so it can be audited at a
//! glance.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// What happens when a field value cannot be computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FailureStrategy {
    /// Substitute the record key digest
    #[default]
    UseDigest,
    /// Temporary failure, record is redelivered
    Fail,
    /// Permanent failure, record is dropped
    Ignore,
}

impl FailureStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UseDigest => "use-digest",
            Self::Fail => "fail",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for FailureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureStrategy {
    type Err = ContractError;

    /// Case-insensitive, `-` and `_` are interchangeable
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "use-digest" => Ok(Self::UseDigest),
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            _ => Err(ContractError::config_validation(
                "failure-strategy",
                format!("unknown failure-strategy {s}"),
            )),
        }
    }
}

impl Serialize for FailureStrategy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FailureStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Field value source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum DynamicFieldSource {
    /// No value; the field is omitted
    None,
    /// Destination's own default
    SystemDefault,
    /// Destination generates the value
    Auto,
    /// Configured literal
    Static { value: String },
    Namespace,
    Set {
        #[serde(default, rename = "failure-strategy")]
        failure_strategy: FailureStrategy,
    },
    Digest,
    UserKey {
        #[serde(default, rename = "failure-strategy")]
        failure_strategy: FailureStrategy,
    },
    BinValue {
        #[serde(rename = "bin-name")]
        bin_name: String,
        #[serde(default, rename = "failure-strategy")]
        failure_strategy: FailureStrategy,
    },
    /// Concatenated digests of all records in a batch
    KeyConcat,
    /// SHA-256 over the concatenated digests of a batch
    KeyHash,
}

impl DynamicFieldSource {
    pub fn static_value(value: impl Into<String>) -> Self {
        Self::Static {
            value: value.into(),
        }
    }

    pub fn bin_value(bin_name: impl Into<String>, failure_strategy: FailureStrategy) -> Self {
        Self::BinValue {
            bin_name: bin_name.into(),
            failure_strategy,
        }
    }

    /// Configuration tag of the variant
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SystemDefault => "system-default",
            Self::Auto => "auto",
            Self::Static { .. } => "static",
            Self::Namespace => "namespace",
            Self::Set { .. } => "set",
            Self::Digest => "digest",
            Self::UserKey { .. } => "user-key",
            Self::BinValue { .. } => "bin-value",
            Self::KeyConcat => "key-concat",
            Self::KeyHash => "key-hash",
        }
    }

    /// Failure strategy of variants whose value may be unavailable
    ///
    /// # Errors
    /// Variants that always produce a value, or whose value is generated by
    /// the destination, have no strategy; asking for one is a programming
    /// error.
    pub fn failure_strategy(&self) -> Result<FailureStrategy, ContractError> {
        let reason = match self {
            Self::Set { failure_strategy }
            | Self::UserKey { failure_strategy }
            | Self::BinValue {
                failure_strategy, ..
            } => return Ok(*failure_strategy),
            Self::None => "no value is ever computed",
            Self::SystemDefault | Self::Auto => "value is generated by the destination",
            Self::Static { .. } => "static value is always available",
            Self::Namespace => "namespace is always available",
            Self::Digest => "digest is always available",
            Self::KeyConcat | Self::KeyHash => "batch key is always available",
        };
        Err(ContractError::capability(format!(
            "'{}' source has no failure strategy: {reason}",
            self.name()
        )))
    }

    /// Startup validation of configured literals
    pub fn validate(&self) -> Result<(), ContractError> {
        match self {
            Self::Static { value } if value.trim().is_empty() => Err(
                ContractError::config_validation("value", "value cannot be blank"),
            ),
            Self::BinValue { bin_name, .. } if bin_name.trim().is_empty() => Err(
                ContractError::config_validation("bin-name", "bin-name cannot be blank"),
            ),
            _ => Ok(()),
        }
    }

    /// Legal as the key of a single outbound record
    pub fn is_allowed_for_single_record_key(&self) -> bool {
        self.capabilities().0
    }

    /// Legal as the key of a batched outbound record
    pub fn is_allowed_for_batch_key(&self) -> bool {
        self.capabilities().1
    }

    /// (single record, batch)
    fn capabilities(&self) -> (bool, bool) {
        match self {
            Self::None | Self::SystemDefault | Self::Auto => (true, true),
            Self::Static { .. }
            | Self::Namespace
            | Self::Set { .. }
            | Self::Digest
            | Self::UserKey { .. }
            | Self::BinValue { .. } => (true, false),
            Self::KeyConcat | Self::KeyHash => (false, true),
        }
    }
}

impl Default for DynamicFieldSource {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for DynamicFieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { value } => write!(f, "static({value})"),
            Self::BinValue {
                bin_name,
                failure_strategy,
            } => write!(f, "bin-value({bin_name}, {failure_strategy})"),
            Self::Set { failure_strategy } | Self::UserKey { failure_strategy } => {
                write!(f, "{}({failure_strategy})", self.name())
            }
            other => f.write_str(other.name()),
        }
    }
}
