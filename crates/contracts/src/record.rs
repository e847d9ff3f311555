//! ChangeNotificationRecord - unit of input
//!
//! One record per database mutation. Flows read-only through routing and
//! formatting; transformers rebuild it to express a mutation.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{BinValue, Digest};

/// Mutation kind shipped with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Write,
    Delete,
    DurableDelete,
}

impl Operation {
    /// True for both plain and durable deletes
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::DurableDelete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Delete => "delete",
            Self::DurableDelete => "durable-delete",
        }
    }
}

/// User supplied key component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserKey {
    Integer(i64),
    String(String),
    Bytes {
        #[serde(with = "crate::serde_base64")]
        bytes: Bytes,
    },
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Bytes { bytes } => {
                for byte in bytes.iter() {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Record key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Key {
    pub namespace: String,

    /// Sets are optional; records may live directly in the namespace
    #[serde(default)]
    pub set: Option<String>,

    /// Present only when the writer asked for the key to be stored
    #[serde(default)]
    pub user_key: Option<UserKey>,

    pub digest: Digest,
}

impl Key {
    pub fn new(namespace: impl Into<String>, set: Option<String>, digest: Digest) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            user_key: None,
            digest,
        }
    }

    pub fn with_user_key(mut self, user_key: UserKey) -> Self {
        self.user_key = Some(user_key);
        self
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.namespace)?;
        if let Some(set) = &self.set {
            f.write_str(set)?;
        }
        f.write_str(":")?;
        if let Some(user_key) = &self.user_key {
            write!(f, "{user_key}")?;
        }
        write!(f, ":{}", self.digest)
    }
}

/// Record metadata
///
/// Generation, last-update-time and expiry are optional because older
/// protocol versions do not ship them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeNotificationMetadata {
    pub key: Key,

    pub operation: Operation,

    #[serde(default)]
    pub generation: Option<u32>,

    #[serde(default)]
    pub last_update_time_ms: Option<u64>,

    /// Seconds since Unix epoch, 0 = never expires
    #[serde(default)]
    pub expiry_time: Option<u32>,
}

impl ChangeNotificationMetadata {
    pub fn new(key: Key, operation: Operation) -> Self {
        Self {
            key,
            operation,
            generation: None,
            last_update_time_ms: None,
            expiry_time: None,
        }
    }

    /// Remaining time to live in seconds
    ///
    /// -1 when the record never expires, 0 when already expired.
    pub fn time_to_live(&self) -> Option<i64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.time_to_live_at(now)
    }

    /// Remaining time to live relative to `now_secs`
    pub fn time_to_live_at(&self, now_secs: u64) -> Option<i64> {
        let expiry = self.expiry_time?;
        if expiry == 0 {
            return Some(-1);
        }
        let expiry = u64::from(expiry);
        Some(expiry.saturating_sub(now_secs) as i64)
    }
}

/// Change notification record
///
/// Bins are owned by the record and only handed out as a read-only view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotificationRecord {
    metadata: ChangeNotificationMetadata,

    #[serde(default)]
    bins: BTreeMap<String, BinValue>,
}

impl ChangeNotificationRecord {
    /// Create a record, copying `bins` into record-owned storage
    pub fn new<I, K>(metadata: ChangeNotificationMetadata, bins: I) -> Self
    where
        I: IntoIterator<Item = (K, BinValue)>,
        K: Into<String>,
    {
        Self {
            metadata,
            bins: bins.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn metadata(&self) -> &ChangeNotificationMetadata {
        &self.metadata
    }

    pub fn bins(&self) -> &BTreeMap<String, BinValue> {
        &self.bins
    }

    pub fn bin(&self, name: &str) -> Option<&BinValue> {
        self.bins.get(name)
    }

    pub fn key(&self) -> &Key {
        &self.metadata.key
    }

    pub fn digest(&self) -> &Digest {
        &self.metadata.key.digest
    }

    pub fn operation(&self) -> Operation {
        self.metadata.operation
    }

    pub fn generation(&self) -> Option<u32> {
        self.metadata.generation
    }

    pub fn last_update_time_ms(&self) -> Option<u64> {
        self.metadata.last_update_time_ms
    }

    pub fn expiry_time(&self) -> Option<u32> {
        self.metadata.expiry_time
    }

    /// New record with the same metadata and the given bins
    pub fn with_bins<I, K>(&self, bins: I) -> Self
    where
        I: IntoIterator<Item = (K, BinValue)>,
        K: Into<String>,
    {
        Self::new(self.metadata.clone(), bins)
    }

    /// New record with the same bins and the given metadata
    pub fn with_metadata(&self, metadata: ChangeNotificationMetadata) -> Self {
        Self {
            metadata,
            bins: self.bins.clone(),
        }
    }

    /// Split into metadata and an owned copy of the bins
    pub fn into_parts(self) -> (ChangeNotificationMetadata, BTreeMap<String, BinValue>) {
        (self.metadata, self.bins)
    }
}

/// Result of a transformer: a record to continue with, or the skip sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Record(ChangeNotificationRecord),
    Skip,
}

impl Transformed {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

impl From<ChangeNotificationRecord> for Transformed {
    fn from(record: ChangeNotificationRecord) -> Self {
        Self::Record(record)
    }
}
