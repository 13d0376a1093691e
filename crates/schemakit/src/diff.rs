//! Diff types
//!
//! An [`InstanceDiff`] maps flat attribute paths to [`AttributeDiff`]
//! records. Only changed attributes appear; see [`crate::differ`] for how a
//! diff is computed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Change of a single flat attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    /// Value in prior state, `""` when there was none
    #[serde(default)]
    pub old: String,
    /// Desired value, `""` when computed or removed
    #[serde(default)]
    pub new: String,
    /// New value is unknown until apply
    #[serde(default, skip_serializing_if = "is_false")]
    pub new_computed: bool,
    /// Attribute is removed
    #[serde(default, skip_serializing_if = "is_false")]
    pub new_removed: bool,
    /// Change cannot be applied in place
    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_new: bool,
    /// Values should not be displayed
    #[serde(default, skip_serializing_if = "is_false")]
    pub sensitive: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl AttributeDiff {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            ..Self::default()
        }
    }

    /// Change to a value only known after apply
    pub fn computed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_computed: true,
            ..Self::default()
        }
    }

    /// Removal of the attribute
    pub fn removed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_removed: true,
            ..Self::default()
        }
    }

    /// Value appears where there was none
    pub fn is_addition(&self) -> bool {
        self.old.is_empty() && !self.new_removed && !self.new_computed
    }

    pub fn is_removal(&self) -> bool {
        self.new_removed
    }

    /// Existing value changes to another known value
    pub fn is_modification(&self) -> bool {
        !self.old.is_empty() && !self.new_removed && !self.new_computed
    }
}

/// Diff of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiff {
    /// Changed attributes by flat path
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDiff>,
    /// Resource is destroyed
    #[serde(default, skip_serializing_if = "is_false")]
    pub destroy: bool,
    /// Resource is destroyed because its state is tainted
    #[serde(default, skip_serializing_if = "is_false")]
    pub destroy_tainted: bool,
}

impl InstanceDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// No attribute changes and no resource-level flags
    pub fn is_empty(&self) -> bool {
        !self.destroy && !self.destroy_tainted && self.attributes.is_empty()
    }

    /// Whether any change forces replacement of the resource
    pub fn requires_new(&self) -> bool {
        self.destroy_tainted || self.attributes.values().any(|a| a.requires_new)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeDiff> {
        self.attributes.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, diff: AttributeDiff) {
        self.attributes.insert(key.into(), diff);
    }

    /// Mark an existing change as forcing replacement
    ///
    /// Returns false if the key has no change to mark.
    pub fn force_new(&mut self, key: &str) -> bool {
        match self.attributes.get_mut(key) {
            Some(attr) => {
                attr.requires_new = true;
                true
            }
            None => false,
        }
    }

    /// Every path whose change forces replacement, in path order
    pub fn replacement_keys(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.requires_new)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diff(self)
    }
}

/// Counts of change kinds in a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
    /// Values only known after apply
    pub computed: usize,
    /// Changes forcing replacement
    pub replacements: usize,
}

impl DiffSummary {
    pub fn from_diff(diff: &InstanceDiff) -> Self {
        let mut summary = Self::default();
        for attr in diff.attributes.values() {
            if attr.new_computed {
                summary.computed += 1;
            } else if attr.is_removal() {
                summary.removals += 1;
            } else if attr.is_addition() {
                summary.additions += 1;
            } else {
                summary.modifications += 1;
            }
            if attr.requires_new {
                summary.replacements += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.computed
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group changes by the top-level attribute they belong to
pub fn group_by_attribute(diff: &InstanceDiff) -> BTreeMap<&str, Vec<(&str, &AttributeDiff)>> {
    let mut groups: BTreeMap<&str, Vec<(&str, &AttributeDiff)>> = BTreeMap::new();
    for (key, attr) in &diff.attributes {
        let root = key.split('.').next().unwrap_or(key);
        groups.entry(root).or_default().push((key.as_str(), attr));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InstanceDiff {
        let mut diff = InstanceDiff::new();
        diff.insert("name", AttributeDiff::new("", "web"));
        diff.insert("image", AttributeDiff::new("nginx:1", "nginx:2"));
        diff.insert("ip", AttributeDiff::computed(""));
        diff.insert("tags.#", AttributeDiff::new("2", "1"));
        diff.insert("tags.1", AttributeDiff::removed("b"));
        diff
    }

    #[test]
    fn test_summary() {
        let summary = sample().summary();
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.modifications, 2);
        assert_eq!(summary.computed, 1);
        assert_eq!(summary.total(), 5);
        assert!(summary.has_changes());
    }

    #[test]
    fn test_requires_new_collects_all() {
        let mut diff = sample();
        assert!(!diff.requires_new());
        assert!(diff.force_new("image"));
        assert!(diff.force_new("name"));
        assert!(!diff.force_new("missing"));
        assert!(diff.requires_new());
        assert_eq!(diff.replacement_keys(), vec!["image", "name"]);
    }

    #[test]
    fn test_empty() {
        let mut diff = InstanceDiff::new();
        assert!(diff.is_empty());
        diff.destroy_tainted = true;
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_group_by_attribute() {
        let diff = sample();
        let groups = group_by_attribute(&diff);
        assert_eq!(groups["tags"].len(), 2);
        assert_eq!(groups["name"].len(), 1);
    }

    #[test]
    fn test_serialize_skips_false_flags() {
        let json = serde_json::to_value(AttributeDiff::new("a", "b")).unwrap();
        assert_eq!(json, serde_json::json!({"old": "a", "new": "b"}));
    }
}
