//! # Field Resolver
//!
//! Evaluates a [`DynamicFieldSource`] against one record or a batch of
//! records.
//!
//! `Ok(None)` means the destination generates or omits the value. When a
//! value cannot be computed the source's failure strategy decides between
//! the digest fallback and an escalated [`ResolutionFailure`].

use bytes::Bytes;
use sha2::{Digest as _, Sha256};
use tracing::{debug, warn};

use contracts::{
    BinValue, ChangeNotificationRecord, Digest, DynamicFieldSource, Escalation, FailureStrategy,
    FieldValue, ResolutionFailure, UserKey,
};

/// Resolve `source` for a single record
pub fn resolve(
    source: &DynamicFieldSource,
    record: &ChangeNotificationRecord,
) -> Result<Option<FieldValue>, ResolutionFailure> {
    let key = record.key();
    let computed = match source {
        DynamicFieldSource::None | DynamicFieldSource::SystemDefault | DynamicFieldSource::Auto => {
            return Ok(None)
        }
        DynamicFieldSource::Static { value } => Ok(FieldValue::Text(value.clone())),
        DynamicFieldSource::Namespace => Ok(FieldValue::Text(key.namespace.clone())),
        DynamicFieldSource::Digest => Ok(digest_value(&key.digest)),
        DynamicFieldSource::Set { .. } => key
            .set
            .clone()
            .map(FieldValue::Text)
            .ok_or_else(|| "record has no set".to_string()),
        DynamicFieldSource::UserKey { .. } => key
            .user_key
            .as_ref()
            .map(user_key_value)
            .ok_or_else(|| "record key has no user key".to_string()),
        DynamicFieldSource::BinValue { bin_name, .. } => bin_value(record, bin_name),
        DynamicFieldSource::KeyConcat | DynamicFieldSource::KeyHash => {
            let failure = ResolutionFailure::new(
                source.name(),
                "batch key source used for a single record",
                Escalation::Temporary,
            );
            warn!(key = %key, error = %failure, "field resolution rejected");
            return Err(failure);
        }
    };

    match computed {
        Ok(value) => {
            debug!(key = %key, source = %source, "field resolved");
            Ok(Some(value))
        }
        Err(reason) => fallback(source, reason, &key.digest, &key.to_string()),
    }
}

/// Resolve `source` jointly for every record of a batch
pub fn resolve_batch(
    source: &DynamicFieldSource,
    records: &[ChangeNotificationRecord],
) -> Result<Option<FieldValue>, ResolutionFailure> {
    match source {
        DynamicFieldSource::None | DynamicFieldSource::SystemDefault | DynamicFieldSource::Auto => {
            Ok(None)
        }
        DynamicFieldSource::KeyConcat | DynamicFieldSource::KeyHash => {
            if records.is_empty() {
                let failure =
                    ResolutionFailure::new(source.name(), "batch is empty", Escalation::Temporary);
                warn!(error = %failure, "batch key resolution failed");
                return Err(failure);
            }

            let concatenated = concat_digests(records);
            let value = if matches!(source, DynamicFieldSource::KeyHash) {
                Bytes::copy_from_slice(&Sha256::digest(&concatenated))
            } else {
                Bytes::from(concatenated)
            };
            debug!(source = %source, records = records.len(), "batch key resolved");
            Ok(Some(FieldValue::Bytes(value)))
        }
        single_only => {
            let failure = ResolutionFailure::new(
                single_only.name(),
                "single record source used for a batch key",
                Escalation::Temporary,
            );
            warn!(records = records.len(), error = %failure, "batch key resolution rejected");
            Err(failure)
        }
    }
}

fn fallback(
    source: &DynamicFieldSource,
    reason: String,
    digest: &Digest,
    key: &str,
) -> Result<Option<FieldValue>, ResolutionFailure> {
    let escalation = match source.failure_strategy() {
        Ok(FailureStrategy::UseDigest) => {
            debug!(key, source = %source, reason = %reason, "falling back to digest");
            return Ok(Some(digest_value(digest)));
        }
        Ok(FailureStrategy::Fail) | Err(_) => Escalation::Temporary,
        Ok(FailureStrategy::Ignore) => Escalation::Permanent,
    };

    let failure = ResolutionFailure::new(source.name(), reason, escalation);
    warn!(key, error = %failure, "field resolution failed");
    Err(failure)
}

fn digest_value(digest: &Digest) -> FieldValue {
    FieldValue::Bytes(Bytes::copy_from_slice(digest.as_bytes()))
}

fn user_key_value(user_key: &UserKey) -> FieldValue {
    match user_key {
        UserKey::Integer(v) => FieldValue::Text(v.to_string()),
        UserKey::String(s) => FieldValue::Text(s.clone()),
        UserKey::Bytes { bytes } => FieldValue::Bytes(bytes.clone()),
    }
}

fn bin_value(record: &ChangeNotificationRecord, bin_name: &str) -> Result<FieldValue, String> {
    match record.bin(bin_name) {
        None => Err(format!("bin '{bin_name}' not found")),
        Some(BinValue::Nil) => Err(format!("bin '{bin_name}' is nil")),
        Some(BinValue::String(s)) | Some(BinValue::GeoJson(s)) => Ok(FieldValue::Text(s.clone())),
        Some(BinValue::Integer(v)) => Ok(FieldValue::Text(v.to_string())),
        Some(BinValue::Double(v)) => Ok(FieldValue::Text(v.to_string())),
        Some(BinValue::Bool(b)) => Ok(FieldValue::Text(b.to_string())),
        Some(BinValue::Blob { bytes, .. }) | Some(BinValue::Hll(bytes)) => {
            Ok(FieldValue::Bytes(bytes.clone()))
        }
        Some(other @ (BinValue::List(_) | BinValue::Map(_))) => Err(format!(
            "bin '{bin_name}' has unsupported particle type {:?}",
            other.particle_type()
        )),
    }
}

fn concat_digests(records: &[ChangeNotificationRecord]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|record| record.digest().as_bytes().iter().copied())
        .collect()
}
