//! Bin values
//!
//! Typed values carried by a change notification. The particle type tag
//! disambiguates values that share a representation (blob flavours,
//! GeoJSON vs. string, HLL vs. blob).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Wire particle type of a bin value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleType {
    Unknown,
    Null,
    Integer,
    Double,
    String,
    Blob,
    JavaBlob,
    CSharpBlob,
    PythonBlob,
    RubyBlob,
    PhpBlob,
    ErlangBlob,
    /// Added in server 5.6
    Boolean,
    Hll,
    Map,
    List,
    GeoJson,
}

impl ParticleType {
    /// Wire value of the particle type
    pub fn value(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::Null => 0,
            Self::Integer => 1,
            Self::Double => 2,
            Self::String => 3,
            Self::Blob => 4,
            Self::JavaBlob => 7,
            Self::CSharpBlob => 8,
            Self::PythonBlob => 9,
            Self::RubyBlob => 10,
            Self::PhpBlob => 11,
            Self::ErlangBlob => 12,
            Self::Boolean => 17,
            Self::Hll => 18,
            Self::Map => 19,
            Self::List => 20,
            Self::GeoJson => 23,
        }
    }

    /// Particle type for a wire value, `Unknown` for unassigned values
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::Integer,
            2 => Self::Double,
            3 => Self::String,
            4 => Self::Blob,
            7 => Self::JavaBlob,
            8 => Self::CSharpBlob,
            9 => Self::PythonBlob,
            10 => Self::RubyBlob,
            11 => Self::PhpBlob,
            12 => Self::ErlangBlob,
            17 => Self::Boolean,
            18 => Self::Hll,
            19 => Self::Map,
            20 => Self::List,
            23 => Self::GeoJson,
            _ => Self::Unknown,
        }
    }

    pub fn is_blob(self) -> bool {
        matches!(
            self,
            Self::Blob
                | Self::JavaBlob
                | Self::CSharpBlob
                | Self::PythonBlob
                | Self::RubyBlob
                | Self::PhpBlob
                | Self::ErlangBlob
        )
    }
}

/// Value of a single bin
#[derive(Debug, Clone, PartialEq)]
pub enum BinValue {
    Nil,
    Integer(i64),
    Double(f64),
    String(String),
    Bool(bool),
    /// Opaque bytes; `particle_type` keeps the language flavour
    Blob {
        particle_type: ParticleType,
        bytes: Bytes,
    },
    GeoJson(String),
    Hll(Bytes),
    List(Vec<BinValue>),
    Map(BTreeMap<String, BinValue>),
}

impl BinValue {
    /// Plain blob (`ParticleType::Blob`)
    pub fn blob(bytes: impl Into<Bytes>) -> Self {
        Self::Blob {
            particle_type: ParticleType::Blob,
            bytes: bytes.into(),
        }
    }

    pub fn particle_type(&self) -> ParticleType {
        match self {
            Self::Nil => ParticleType::Null,
            Self::Integer(_) => ParticleType::Integer,
            Self::Double(_) => ParticleType::Double,
            Self::String(_) => ParticleType::String,
            Self::Bool(_) => ParticleType::Boolean,
            Self::Blob { particle_type, .. } => *particle_type,
            Self::GeoJson(_) => ParticleType::GeoJson,
            Self::Hll(_) => ParticleType::Hll,
            Self::List(_) => ParticleType::List,
            Self::Map(_) => ParticleType::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Human readable rendering used by text formatters.
    ///
    /// Scalars render bare, byte values render as Base64, collections as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Nil => "null".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::String(s) | Self::GeoJson(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Blob { bytes, .. } | Self::Hll(bytes) => BASE64.encode(bytes),
            Self::List(_) | Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// JSON representation used by the built-in encoders
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Nil => Value::Null,
            Self::Integer(v) => Value::from(*v),
            Self::Double(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) | Self::GeoJson(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Blob { bytes, .. } | Self::Hll(bytes) => Value::String(BASE64.encode(bytes)),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for BinValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Nil,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Double(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for BinValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for BinValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for BinValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for BinValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for BinValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

const PARTICLE_TYPE_FIELD: &str = "particle-type";
const VALUE_FIELD: &str = "value";

impl BinValue {
    /// Lossless JSON form
    ///
    /// JSON-native values map as in [`BinValue::to_json`]. Blobs, HLLs and
    /// GeoJSON are wrapped as `{"particle-type": <code>, "value": ..}` with
    /// bytes in Base64, so the particle type survives a round trip.
    pub fn to_tagged_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        match self {
            Self::Blob {
                particle_type,
                bytes,
            } => json!({ PARTICLE_TYPE_FIELD: particle_type.value(), VALUE_FIELD: BASE64.encode(bytes) }),
            Self::Hll(bytes) => {
                json!({ PARTICLE_TYPE_FIELD: ParticleType::Hll.value(), VALUE_FIELD: BASE64.encode(bytes) })
            }
            Self::GeoJson(s) => json!({ PARTICLE_TYPE_FIELD: ParticleType::GeoJson.value(), VALUE_FIELD: s }),
            Self::List(items) => Value::Array(items.iter().map(Self::to_tagged_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_tagged_json()))
                    .collect(),
            ),
            other => other.to_json(),
        }
    }

    /// Inverse of [`BinValue::to_tagged_json`]; plain JSON is accepted too
    ///
    /// An object with exactly the `particle-type` and `value` fields is read
    /// as a typed value. Integers outside the `i64` range are rejected.
    pub fn from_tagged_json(value: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value;

        match value {
            Value::Number(n) => number(&n),
            Value::Array(items) => items
                .into_iter()
                .map(Self::from_tagged_json)
                .collect::<Result<_, _>>()
                .map(Self::List),
            Value::Object(mut entries) if is_tagged(&entries) => {
                let code = entries
                    .remove(PARTICLE_TYPE_FIELD)
                    .and_then(|v| v.as_i64())
                    .and_then(|v| i32::try_from(v).ok())
                    .unwrap_or(-1);
                let value = entries.remove(VALUE_FIELD).unwrap_or(Value::Null);
                tagged(ParticleType::from_i32(code), code, value)
            }
            Value::Object(entries) => entries
                .into_iter()
                .map(|(k, v)| Self::from_tagged_json(v).map(|v| (k, v)))
                .collect::<Result<_, _>>()
                .map(Self::Map),
            other => Ok(Self::from(other)),
        }
    }
}

fn is_tagged(entries: &serde_json::Map<String, serde_json::Value>) -> bool {
    entries.len() == 2
        && entries.contains_key(VALUE_FIELD)
        && entries
            .get(PARTICLE_TYPE_FIELD)
            .is_some_and(serde_json::Value::is_i64)
}

fn number(n: &serde_json::Number) -> Result<BinValue, String> {
    if let Some(i) = n.as_i64() {
        return Ok(BinValue::Integer(i));
    }
    if n.is_u64() {
        return Err(format!("integer {n} is out of range"));
    }
    n.as_f64()
        .map(BinValue::Double)
        .ok_or_else(|| format!("invalid number {n}"))
}

fn tagged(
    particle_type: ParticleType,
    code: i32,
    value: serde_json::Value,
) -> Result<BinValue, String> {
    let text = |value: serde_json::Value| match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(format!("particle type {code} expects a string value, got {other}")),
    };
    let bytes = |value: serde_json::Value| {
        let encoded = text(value)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(|e| format!("particle type {code} expects Base64: {e}"))
    };

    match particle_type {
        ParticleType::Unknown => Err(format!("unknown particle type {code}")),
        t if t.is_blob() => Ok(BinValue::Blob {
            particle_type: t,
            bytes: bytes(value)?,
        }),
        ParticleType::Hll => Ok(BinValue::Hll(bytes(value)?)),
        ParticleType::GeoJson => Ok(BinValue::GeoJson(text(value)?)),
        ParticleType::Double => value
            .as_f64()
            .map(BinValue::Double)
            .ok_or_else(|| format!("particle type {code} expects a number")),
        expected => {
            let decoded = BinValue::from_tagged_json(value)?;
            if decoded.particle_type() == expected {
                Ok(decoded)
            } else {
                Err(format!(
                    "particle type {code} does not match value of type {}",
                    decoded.particle_type().value()
                ))
            }
        }
    }
}

impl Serialize for BinValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_tagged_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BinValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_tagged_json(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_type_round_trip_and_unknown() {
        for value in [0, 1, 2, 3, 4, 7, 12, 17, 18, 19, 20, 23] {
            assert_eq!(ParticleType::from_i32(value).value(), value);
        }
        assert_eq!(ParticleType::from_i32(5), ParticleType::Unknown);
        assert_eq!(ParticleType::from_i32(99), ParticleType::Unknown);
    }

    #[test]
    fn test_particle_type_disambiguates_blob_flavours() {
        let python = BinValue::Blob {
            particle_type: ParticleType::PythonBlob,
            bytes: Bytes::from_static(b"\x80\x04"),
        };
        assert!(python.particle_type().is_blob());
        assert_eq!(python.particle_type(), ParticleType::PythonBlob);
        assert_eq!(
            BinValue::GeoJson("{}".into()).particle_type(),
            ParticleType::GeoJson
        );
        assert_eq!(BinValue::from("{}").particle_type(), ParticleType::String);
    }

    #[test]
    fn test_json_mapping() {
        let value: BinValue = serde_json::from_str(r#"{"a": 1, "b": [true, 2.5, null]}"#).unwrap();
        let BinValue::Map(entries) = &value else {
            panic!("expected map, got {value:?}");
        };
        assert_eq!(entries["a"], BinValue::Integer(1));
        assert_eq!(
            entries["b"],
            BinValue::List(vec![
                BinValue::Bool(true),
                BinValue::Double(2.5),
                BinValue::Nil
            ])
        );
    }

    #[test]
    fn test_blob_renders_as_base64() {
        let blob = BinValue::blob(Bytes::from_static(b"hi"));
        assert_eq!(blob.to_display_string(), "aGk=");
        assert_eq!(blob.to_json(), serde_json::json!("aGk="));
    }

    fn every_particle_type() -> Vec<BinValue> {
        let blob = |particle_type| BinValue::Blob {
            particle_type,
            bytes: Bytes::from_static(b"\x80\x04\x00"),
        };
        vec![
            BinValue::Nil,
            BinValue::Integer(i64::MAX),
            BinValue::Double(2.5),
            BinValue::from("{\"type\": \"Point\"}"),
            blob(ParticleType::Blob),
            blob(ParticleType::JavaBlob),
            blob(ParticleType::CSharpBlob),
            blob(ParticleType::PythonBlob),
            blob(ParticleType::RubyBlob),
            blob(ParticleType::PhpBlob),
            blob(ParticleType::ErlangBlob),
            BinValue::Bool(true),
            BinValue::Hll(Bytes::from_static(&[1, 2, 3, 4])),
            BinValue::Map(BTreeMap::from([
                ("geo".to_string(), BinValue::GeoJson("{}".into())),
                ("n".to_string(), BinValue::Integer(1)),
            ])),
            BinValue::List(vec![blob(ParticleType::JavaBlob), BinValue::from("x")]),
            BinValue::GeoJson(r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#.into()),
        ]
    }

    #[test]
    fn test_serde_keeps_particle_types() {
        let values = every_particle_type();
        let covered: std::collections::HashSet<i32> =
            values.iter().map(|v| v.particle_type().value()).collect();
        for code in [0, 1, 2, 3, 4, 7, 8, 9, 10, 11, 12, 17, 18, 19, 20, 23] {
            assert!(covered.contains(&code), "particle type {code} not covered");
        }

        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: BinValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "round trip through {json}");
            assert_eq!(back.particle_type(), value.particle_type());
        }
    }

    #[test]
    fn test_tagged_wire_form() {
        let python = BinValue::Blob {
            particle_type: ParticleType::PythonBlob,
            bytes: Bytes::from_static(b"hi"),
        };
        assert_eq!(
            serde_json::to_value(&python).unwrap(),
            serde_json::json!({"particle-type": 9, "value": "aGk="})
        );

        let geo: BinValue =
            serde_json::from_str(r#"{"particle-type": 23, "value": "{}"}"#).unwrap();
        assert_eq!(geo, BinValue::GeoJson("{}".into()));

        let double: BinValue =
            serde_json::from_str(r#"{"particle-type": 2, "value": 3}"#).unwrap();
        assert_eq!(double, BinValue::Double(3.0));
    }

    #[test]
    fn test_tagged_rejects_bad_input() {
        for json in [
            r#"{"particle-type": 5, "value": "aGk="}"#,
            r#"{"particle-type": 4, "value": "not base64!"}"#,
            r#"{"particle-type": 4, "value": 1}"#,
            r#"{"particle-type": 3, "value": 1}"#,
            "18446744073709551615",
        ] {
            assert!(serde_json::from_str::<BinValue>(json).is_err(), "accepted {json}");
        }
    }

    #[test]
    fn test_plain_objects_stay_maps() {
        let value: BinValue =
            serde_json::from_str(r#"{"particle-type": 4, "value": "aGk=", "extra": 1}"#).unwrap();
        assert!(matches!(value, BinValue::Map(ref m) if m.len() == 3));
    }
}
