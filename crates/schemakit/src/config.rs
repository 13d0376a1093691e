//! Raw resource configuration
//!
//! A [`ResourceConfig`] is the desired state as written by the user: an
//! untyped mapping from top-level attribute names to [`RawValue`]s.

use crate::error::{Error, Result};
use crate::raw::RawValue;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Untyped desired configuration of one resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceConfig {
    raw: BTreeMap<String, RawValue>,
}

impl ResourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON document, which must be an object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match RawValue::from(value) {
            RawValue::Mapping(raw) => Ok(Self { raw }),
            other => Err(Error::type_mismatch("", "mapping", other.kind())),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.raw.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.raw.insert(key.into(), value.into());
    }

    /// Look up a value by dotted path (`rules.0.port`)
    pub fn get(&self, path: &str) -> Option<&RawValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let top = self.raw.get(head)?;
        match rest {
            Some(rest) => top.get_path(rest),
            None => Some(top),
        }
    }

    /// Whether a path is present and not null
    pub fn is_set(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Whether a path holds, or contains, the computed placeholder
    pub fn is_computed(&self, path: &str) -> bool {
        self.get(path).is_some_and(RawValue::contains_computed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.raw.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn raw(&self) -> &BTreeMap<String, RawValue> {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl From<BTreeMap<String, RawValue>> for ResourceConfig {
    fn from(raw: BTreeMap<String, RawValue>) -> Self {
        Self { raw }
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for ResourceConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            raw: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        BTreeMap::<String, RawValue>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::UNKNOWN_VARIABLE_VALUE;
    use serde_json::json;

    #[test]
    fn test_from_json_requires_object() {
        assert!(ResourceConfig::from_json(json!({"name": "web"})).is_ok());
        let err = ResourceConfig::from_json(json!(["web"])).unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn test_get_nested() {
        let config = ResourceConfig::from_json(json!({
            "name": "web",
            "rules": [{"port": 80}]
        }))
        .unwrap();
        assert_eq!(config.get("name"), Some(&RawValue::from("web")));
        assert_eq!(config.get("rules.0.port"), Some(&RawValue::Int(80)));
        assert_eq!(config.get("rules.1.port"), None);
    }

    #[test]
    fn test_is_set_and_computed() {
        let config = ResourceConfig::new()
            .with("name", "web")
            .with("image", RawValue::Null)
            .with("ip", UNKNOWN_VARIABLE_VALUE);
        assert!(config.is_set("name"));
        assert!(!config.is_set("image"));
        assert!(!config.is_set("missing"));
        assert!(config.is_computed("ip"));
        assert!(!config.is_computed("name"));
    }

    #[test]
    fn test_deserialize() {
        let config: ResourceConfig = serde_json::from_str(r#"{"count": 2, "tags": ["a"]}"#).unwrap();
        assert_eq!(config.get("count"), Some(&RawValue::Int(2)));
        assert_eq!(config.get("tags.0"), Some(&RawValue::from("a")));
    }
}
