//! Raw, untyped configuration values
//!
//! Configuration arrives as loosely typed data (scalars, sequences and
//! mappings). Nothing in here knows about the schema; the coercion layer
//! turns these into typed [`Value`](crate::Value)s.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Placeholder string standing for a value that is unknown until apply.
///
/// Raw input containing exactly this string is read as
/// [`RawValue::Computed`].
pub const UNKNOWN_VARIABLE_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// An untyped configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
    /// Reference to a value that is not known yet
    Computed,
}

impl RawValue {
    /// Short description of the value's shape, used in error messages
    pub fn kind(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => format!("bool {b}"),
            Self::Int(i) => format!("number {i}"),
            Self::Float(f) => format!("number {f}"),
            Self::String(s) => format!("string {s:?}"),
            Self::Sequence(_) => "sequence".to_string(),
            Self::Mapping(_) => "mapping".to_string(),
            Self::Computed => "computed value".to_string(),
        }
    }

    /// Whether this is the computed placeholder itself
    pub fn is_computed(&self) -> bool {
        match self {
            Self::Computed => true,
            Self::String(s) => s == UNKNOWN_VARIABLE_VALUE,
            _ => false,
        }
    }

    /// Whether this value or anything nested inside it is computed
    pub fn contains_computed(&self) -> bool {
        match self {
            Self::Sequence(items) => items.iter().any(Self::contains_computed),
            Self::Mapping(map) => map.values().any(Self::contains_computed),
            other => other.is_computed(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Look up a nested value by dotted path (`tags.0.key`)
    pub fn get_path(&self, path: &str) -> Option<&RawValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Self::Mapping(map) => map.get(segment)?,
                Self::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        if s == UNKNOWN_VARIABLE_VALUE {
            Self::Computed
        } else {
            Self::String(s)
        }
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for RawValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawValue>> From<BTreeMap<String, T>> for RawValue {
    fn from(map: BTreeMap<String, T>) -> Self {
        Self::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => serializer.collect_seq(items),
            Self::Mapping(map) => serializer.collect_map(map),
            Self::Computed => serializer.serialize_str(UNKNOWN_VARIABLE_VALUE),
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
