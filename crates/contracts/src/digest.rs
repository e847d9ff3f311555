//! Digest - fixed-width record key digest
//!
//! Always shipped with a change notification, so it is the identifier of
//! last resort for every dynamic field.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::ContractError;

/// Length of a record digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Record key digest.
///
/// Displayed as lowercase hex, serialized as Base64.
///
/// # Examples
/// ```
/// use contracts::Digest;
///
/// let digest = Digest::new([7u8; 20]);
/// assert_eq!(digest.as_bytes().len(), 20);
/// assert_eq!(Digest::from_base64(&digest.to_base64()).unwrap(), digest);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    #[inline]
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a digest from a slice, rejecting any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ContractError> {
        let array: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            ContractError::Other(format!(
                "digest must be {DIGEST_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, ContractError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| ContractError::Other(format!("invalid digest encoding: {e}")))?;
        Self::from_slice(&bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl AsRef<[u8]> for Digest {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    #[inline]
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}
