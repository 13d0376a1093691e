//! Prior instance state

use crate::flatmap::FlatMap;
use serde::{Deserialize, Serialize};

/// Materialized attributes of an existing resource, in flat form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Resource identifier; empty means the resource does not exist
    #[serde(default)]
    pub id: String,

    /// Flat attribute map (`tags.#`, `tags.0`, ...)
    #[serde(default)]
    pub attributes: FlatMap,

    /// Marked for replacement regardless of configuration
    #[serde(default)]
    pub tainted: bool,
}

impl InstanceState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
