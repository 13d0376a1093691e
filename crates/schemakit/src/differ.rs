//! Diff engine
//!
//! Walks the schema against the prior state and the coerced configuration
//! and records one [`AttributeDiff`] per changed flat path.
//!
//! The walk works on typed values on both sides: state is expanded from
//! its flat form, configuration is coerced. Primitives are compared by
//! their flat string form, lists element by element, sets by their hash
//! codes and maps entry by entry.
//!
//! Rules applied per primitive change:
//!
//! - a computed attribute left out of the configuration keeps its old
//!   value, or becomes `new_computed` when there is none
//! - a non-computed attribute left out of the configuration is
//!   `new_removed`
//! - `force_new` marks `requires_new` when the value changes or is
//!   computed
//!
//! Set elements are always diffed in full (`all`): an added element shows
//! every field, and a removed element shows every path it had in state as
//! `new_removed`.

use crate::config::ResourceConfig;
use crate::diff::{AttributeDiff, InstanceDiff};
use crate::error::Result;
use crate::flatmap::{FlatMap, expand_all, flatten, flatten_block};
use crate::raw::UNKNOWN_VARIABLE_VALUE;
use crate::schema::{Attribute, Elem, SchemaMap, ValueType};
use crate::set::Set;
use crate::state::InstanceState;
use crate::value::Value;
use std::collections::BTreeMap;

static UNKNOWN: Value = Value::Unknown;

/// Hook that may adjust a computed diff before it is returned
///
/// Runs after the attribute walk, and again on the replacement diff when
/// the first pass requires a new resource. Not called for tainted state.
pub trait CustomizeDiff<M: ?Sized> {
    fn customize(&self, diff: &mut InstanceDiff, meta: &M) -> Result<()>;
}

impl<M: ?Sized, F> CustomizeDiff<M> for F
where
    F: Fn(&mut InstanceDiff, &M) -> Result<()>,
{
    fn customize(&self, diff: &mut InstanceDiff, meta: &M) -> Result<()> {
        self(diff, meta)
    }
}

impl SchemaMap {
    /// Compute the diff between `state` and `config`
    ///
    /// `Ok(None)` means there is nothing to change. With
    /// `handle_requires_new`, a diff that forces replacement is recomputed
    /// as a full creation diff: every configured attribute appears, old
    /// values come from state, and the replacement flags of the first pass
    /// are kept.
    pub fn diff<M: ?Sized>(
        &self,
        state: Option<&InstanceState>,
        config: &ResourceConfig,
        customize: Option<&dyn CustomizeDiff<M>>,
        meta: &M,
        handle_requires_new: bool,
    ) -> Result<Option<InstanceDiff>> {
        let desired = self.coerce(config)?;
        let prior = match state {
            Some(state) => expand_all(self, &state.attributes)?,
            None => BTreeMap::new(),
        };
        let has_id = state.is_some_and(|s| !s.id.is_empty());
        let tainted = state.is_some_and(|s| s.tainted);

        let mut result = self.diff_pass(&prior, &desired, has_id);
        result.destroy_tainted = tainted;
        log::debug!(
            "diff pass found {} changes (existing: {has_id}, tainted: {tainted})",
            result.len()
        );

        if !result.destroy_tainted
            && let Some(hook) = customize
        {
            hook.customize(&mut result, meta)?;
        }

        if handle_requires_new && result.requires_new() {
            log::debug!(
                "replacement forced by {:?}, recomputing as creation diff",
                result.replacement_keys()
            );
            let mut replacement = self.diff_pass(&BTreeMap::new(), &desired, false);
            replacement.destroy_tainted = result.destroy_tainted;

            if !replacement.destroy_tainted
                && let Some(hook) = customize
            {
                hook.customize(&mut replacement, meta)?;
            }

            for (key, attr) in &mut replacement.attributes {
                attr.requires_new = false;
                if let Some(state) = state {
                    attr.old = state.attributes.get(key).cloned().unwrap_or_default();
                }
            }
            for (key, attr) in result.attributes {
                let requires_new = attr.requires_new;
                let entry = replacement.attributes.entry(key).or_insert(attr);
                if requires_new {
                    entry.requires_new = true;
                }
            }
            result = replacement;
        }

        if result.is_empty() {
            Ok(None)
        } else {
            Ok(Some(result))
        }
    }

    fn diff_pass(
        &self,
        prior: &BTreeMap<String, Value>,
        desired: &BTreeMap<String, Value>,
        has_id: bool,
    ) -> InstanceDiff {
        let differ = Differ { has_id };
        let mut diff = InstanceDiff::new();
        for (name, attr) in self.iter() {
            differ.diff(name, attr, prior.get(name), desired.get(name), false, &mut diff);
        }
        diff
    }
}

/// How the elements of a collection are diffed
enum ElementKind<'a> {
    /// Plain values; the descriptor carries the parent's `force_new`
    Type(Attribute),
    Block(&'a SchemaMap),
}

impl<'a> ElementKind<'a> {
    fn of(attr: &'a Attribute) -> Option<Self> {
        match attr.elem.as_ref()? {
            Elem::Type(elem) => {
                let mut elem = (**elem).clone();
                elem.force_new = attr.force_new;
                Some(Self::Type(elem))
            }
            Elem::Block(schema) => Some(Self::Block(schema)),
        }
    }
}

struct Differ {
    /// Prior state belongs to an existing resource
    has_id: bool,
}

impl Differ {
    fn diff(
        &self,
        key: &str,
        attr: &Attribute,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        let mut unsuppressed = InstanceDiff::new();
        match attr.value_type {
            ValueType::List => self.diff_list(key, attr, old, new, all, &mut unsuppressed),
            ValueType::Set => self.diff_set(key, attr, old, new, all, &mut unsuppressed),
            ValueType::Map => Self::diff_map(key, attr, old, new, all, &mut unsuppressed),
            _ => self.diff_primitive(key, attr, old, new, all, &mut unsuppressed),
        }

        for (path, change) in unsuppressed.attributes {
            if let Some(suppress) = &attr.diff_suppress
                && suppress(&path, &change.old, &change.new)
            {
                // inside a set the element must still appear, as a no-op
                if all {
                    let old = change.old;
                    out.insert(path, AttributeDiff::new(old.clone(), old));
                }
                continue;
            }
            log::trace!("{path}: {:?} => {:?}", change.old, change.new);
            out.insert(path, change);
        }
    }

    fn diff_primitive(
        &self,
        key: &str,
        attr: &Attribute,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        let computed = new.is_some_and(Value::is_unknown);
        let os = old.and_then(Value::flat_string).unwrap_or_default();
        let ns = match new {
            Some(Value::Unknown) => String::new(),
            Some(value) => value.flat_string().unwrap_or_default(),
            None if old.is_some() => Value::zero(attr.value_type)
                .flat_string()
                .unwrap_or_default(),
            None => String::new(),
        };

        if os == ns && !all && !computed {
            if !os.is_empty() || self.has_id {
                return;
            }
            if !attr.computed {
                return;
            }
        }

        let removed = old.is_some() && new.is_none();
        if removed && attr.computed && !all {
            return;
        }

        let change = AttributeDiff {
            old: os,
            new: ns,
            new_computed: computed,
            new_removed: removed,
            ..AttributeDiff::default()
        };
        if let Some(change) = finalize(attr, change) {
            out.insert(key, change);
        }
    }

    fn diff_list(
        &self,
        key: &str,
        attr: &Attribute,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        let computed_list = new.is_some_and(Value::is_unknown);
        let new = new.filter(|_| !computed_list);

        if old.is_some() && new.is_none() && !computed_list && attr.computed && !all {
            return;
        }

        let empty = Vec::new();
        let old_items = old.and_then(Value::as_list).unwrap_or(&empty);
        let new_items = new.and_then(Value::as_list).unwrap_or(&empty);
        if !all && new.is_some() && old_items == new_items {
            return;
        }

        let (old_len, new_len) = (old_items.len(), new_items.len());
        let count_key = format!("{key}.#");
        if computed_list {
            let mut change = AttributeDiff::computed(old_len.to_string());
            change.requires_new = attr.force_new;
            out.insert(count_key, change);
            return;
        }

        let changed = old_len != new_len;
        let computed = old_len == 0 && new_len == 0 && attr.computed;
        if changed || computed || all {
            let change = if computed {
                AttributeDiff::default()
            } else {
                AttributeDiff::new(old_len.to_string(), new_len.to_string())
            };
            if let Some(change) = finalize(&count_attribute(attr), change) {
                out.insert(count_key, change);
            }
        }

        let Some(kind) = ElementKind::of(attr) else {
            return;
        };
        for i in 0..old_len.max(new_len) {
            let element_key = format!("{key}.{i}");
            self.diff_element(&element_key, &kind, old_items.get(i), new_items.get(i), all, out);
        }
    }

    fn diff_set(
        &self,
        key: &str,
        attr: &Attribute,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        let computed_set = new.is_some_and(Value::is_unknown);
        let new = new.filter(|_| !computed_set);

        if old.is_some() && new.is_none() && !computed_set && attr.computed && !all {
            return;
        }

        let empty = Set::new();
        let old_items = old.and_then(Value::as_set).unwrap_or(&empty);
        let new_items = new.and_then(Value::as_set).unwrap_or(&empty);
        if !all && new.is_some() && old_items.same_codes(new_items) {
            return;
        }

        let count = count_attribute(attr);
        let count_key = format!("{key}.#");
        if computed_set || (attr.computed && new.is_none()) {
            let old_count = old.and_then(Value::as_set).map(Set::len);
            if old_count == Some(0) && new.is_none() && !computed_set {
                return;
            }
            let old_str = old_count.map(|n| n.to_string()).unwrap_or_default();
            if let Some(change) = finalize(&count, AttributeDiff::computed(old_str)) {
                out.insert(count_key, change);
            }
            return;
        }

        let (old_len, new_len) = (old_items.len(), new_items.len());
        if old_len != new_len || all {
            let change = AttributeDiff::new(old_len.to_string(), new_len.to_string());
            if let Some(change) = finalize(&count, change) {
                out.insert(count_key, change);
            }
        }

        let Some(kind) = ElementKind::of(attr) else {
            return;
        };
        for (code, item) in old_items.difference(new_items).iter() {
            remove_element(&format!("{key}.{code}"), attr, &kind, item, out);
        }
        for code in new_items.codes() {
            let element_key = format!("{key}.{code}");
            self.diff_element(&element_key, &kind, old_items.get(code), new_items.get(code), true, out);
        }
    }

    fn diff_map(
        key: &str,
        attr: &Attribute,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        let new_computed = new.is_some_and(Value::is_unknown);
        let empty = BTreeMap::new();
        let old_map = old.and_then(Value::as_map).unwrap_or(&empty);
        let new_map = new.and_then(Value::as_map).unwrap_or(&empty);

        let (old_len, new_len) = (old_map.len(), new_map.len());
        let changed = old_len != new_len && !(old_len != 0 && new_len == 0 && attr.computed);
        // present in state, even empty, means it was computed already
        let computed = old_len == 0 && new_len == 0 && attr.computed && old.is_none();

        if changed || computed || new_computed {
            let count = Attribute {
                computed: attr.computed || new_computed,
                force_new: attr.force_new,
                ..Attribute::int()
            };
            let change = if computed || new_computed {
                AttributeDiff::default()
            } else {
                AttributeDiff::new(old_len.to_string(), new_len.to_string())
            };
            if let Some(change) = finalize(&count, change) {
                out.insert(format!("{key}.%"), change);
            }
        }

        if new_computed || (new.is_none() && attr.computed && !all) {
            return;
        }

        for (entry, value) in new_map {
            let ns = value.flat_string().unwrap_or_default();
            let os = old_map.get(entry).and_then(Value::flat_string);
            if os.as_deref() == Some(ns.as_str()) && !all {
                continue;
            }
            let change = AttributeDiff::new(os.unwrap_or_default(), ns);
            if let Some(change) = finalize(attr, change) {
                out.insert(format!("{key}.{entry}"), change);
            }
        }
        for (entry, value) in old_map {
            if new_map.contains_key(entry) {
                continue;
            }
            let change = AttributeDiff::removed(value.flat_string().unwrap_or_default());
            if let Some(change) = finalize(attr, change) {
                out.insert(format!("{key}.{entry}"), change);
            }
        }
    }

    fn diff_element(
        &self,
        key: &str,
        kind: &ElementKind<'_>,
        old: Option<&Value>,
        new: Option<&Value>,
        all: bool,
        out: &mut InstanceDiff,
    ) {
        match kind {
            ElementKind::Type(elem) => self.diff(key, elem, old, new, all, out),
            ElementKind::Block(schema) => {
                for (name, field) in schema.iter() {
                    let field_key = format!("{key}.{name}");
                    self.diff(&field_key, field, field_of(old, name), field_of(new, name), all, out);
                }
            }
        }
    }
}

/// Record every stored path of a dropped set element as removed
///
/// Only paths the element actually had in state are emitted, so fields it
/// never set cannot reappear in the view. Diff suppression does not apply.
fn remove_element(
    key: &str,
    set: &Attribute,
    kind: &ElementKind<'_>,
    item: &Value,
    out: &mut InstanceDiff,
) {
    let mut stored = FlatMap::new();
    match kind {
        ElementKind::Type(elem) => flatten(key, elem, item, &mut stored),
        ElementKind::Block(schema) => flatten_block(key, schema, item, &mut stored),
    }

    for (path, old) in stored {
        let field = match kind {
            ElementKind::Type(elem) => Some(elem),
            ElementKind::Block(schema) => path
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.split('.').next())
                .and_then(|name| schema.get(name)),
        };
        let mut change = AttributeDiff::removed(old);
        change.requires_new = set.force_new || field.is_some_and(|f| f.force_new);
        change.sensitive = set.sensitive || field.is_some_and(|f| f.sensitive);
        log::trace!("{path}: {:?} => (removed)", change.old);
        out.insert(path, change);
    }
}

/// Field of a block element; every field of an unknown block is unknown
fn field_of<'a>(block: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    match block? {
        Value::Unknown => Some(&UNKNOWN),
        Value::Map(fields) => fields.get(name),
        _ => None,
    }
}

/// Descriptor used for the `#` count of a list or set
fn count_attribute(attr: &Attribute) -> Attribute {
    Attribute {
        computed: attr.computed,
        force_new: attr.force_new,
        ..Attribute::int()
    }
}

/// Apply the attribute's flags to a raw change; `None` drops the change
fn finalize(attr: &Attribute, mut change: AttributeDiff) -> Option<AttributeDiff> {
    if attr.value_type == ValueType::Bool {
        change.old = normalize_bool(&change.old);
        change.new = normalize_bool(&change.new);
    }

    if attr.computed && !change.new_removed {
        if !change.old.is_empty() && change.new.is_empty() && !change.new_computed {
            return None;
        }
        if change.new.is_empty() {
            change.new_computed = true;
        }
    }

    if attr.force_new {
        change.requires_new = change.old != change.new || change.new_computed;
    }
    change.sensitive = attr.sensitive;
    Some(change)
}

fn normalize_bool(s: &str) -> String {
    if s.is_empty() || s == UNKNOWN_VARIABLE_VALUE {
        return s.to_string();
    }
    match crate::coerce::parse_bool(s) {
        Some(b) => b.to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::raw::RawValue;
    use crate::set::hash_value;
    use serde_json::json;
    use std::sync::Arc;

    fn config(value: serde_json::Value) -> ResourceConfig {
        ResourceConfig::from_json(value).unwrap()
    }

    fn run(
        schema: &SchemaMap,
        state: Option<&InstanceState>,
        value: serde_json::Value,
    ) -> Option<InstanceDiff> {
        schema
            .diff::<()>(state, &config(value), None, &(), false)
            .unwrap()
    }

    #[test]
    fn test_creation_without_state() {
        let schema = SchemaMap::new().with("name", Attribute::string().optional());
        let diff = run(&schema, None, json!({"name": "x"})).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("name"), Some(&AttributeDiff::new("", "x")));
    }

    #[test]
    fn test_no_changes_is_none() {
        let schema = SchemaMap::new().with("name", Attribute::string().optional());
        let state = InstanceState::new("i-1").with("name", "x");
        assert!(run(&schema, Some(&state), json!({"name": "x"})).is_none());
        assert!(run(&schema, None, json!({})).is_none());
    }

    #[test]
    fn test_update_and_removal() {
        let schema = SchemaMap::new()
            .with("name", Attribute::string().optional())
            .with("image", Attribute::string().optional());
        let state = InstanceState::new("i-1")
            .with("name", "web")
            .with("image", "nginx");
        let diff = run(&schema, Some(&state), json!({"name": "api"})).unwrap();
        assert_eq!(diff.get("name"), Some(&AttributeDiff::new("web", "api")));
        let image = diff.get("image").unwrap();
        assert!(image.new_removed);
        assert_eq!(image.old, "nginx");
    }

    #[test]
    fn test_computed_unset() {
        let schema = SchemaMap::new().with("ip", Attribute::string().optional().computed());
        let diff = run(&schema, None, json!({})).unwrap();
        let ip = diff.get("ip").unwrap();
        assert!(ip.new_computed);
        assert_eq!(ip.new, "");

        // once known, leaving it unset keeps the old value
        let state = InstanceState::new("i-1").with("ip", "10.0.0.1");
        assert!(run(&schema, Some(&state), json!({})).is_none());
    }

    #[test]
    fn test_computed_placeholder_in_config() {
        let schema = SchemaMap::new()
            .with("ip", Attribute::string().optional())
            .with("tags", Attribute::list(Elem::primitive(ValueType::String)).optional());
        let diff = run(
            &schema,
            None,
            json!({"ip": UNKNOWN_VARIABLE_VALUE, "tags": UNKNOWN_VARIABLE_VALUE}),
        )
        .unwrap();
        assert!(diff.get("ip").unwrap().new_computed);
        assert!(diff.get("tags.#").unwrap().new_computed);
    }

    #[test]
    fn test_list_changes() {
        let schema = SchemaMap::new().with(
            "tags",
            Attribute::list(Elem::primitive(ValueType::String)).optional(),
        );
        let state = InstanceState::new("i-1")
            .with("tags.#", "2")
            .with("tags.0", "a")
            .with("tags.1", "b");
        let diff = run(&schema, Some(&state), json!({"tags": ["a"]})).unwrap();
        assert_eq!(diff.get("tags.#"), Some(&AttributeDiff::new("2", "1")));
        assert!(diff.get("tags.1").unwrap().new_removed);
        assert!(diff.get("tags.0").is_none());
    }

    #[test]
    fn test_nested_block_field_change() {
        let schema = SchemaMap::new().with(
            "rules",
            Attribute::list(Elem::block(
                SchemaMap::new()
                    .with("port", Attribute::int().required())
                    .with("proto", Attribute::string().optional().with_default("tcp")),
            ))
            .optional(),
        );
        let state = InstanceState::new("i-1")
            .with("rules.#", "1")
            .with("rules.0.port", "80")
            .with("rules.0.proto", "tcp");
        let diff = run(&schema, Some(&state), json!({"rules": [{"port": 443}]})).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("rules.0.port"), Some(&AttributeDiff::new("80", "443")));
    }

    #[test]
    fn test_set_reordering_is_not_a_change() {
        let schema = SchemaMap::new().with(
            "zones",
            Attribute::set(Elem::primitive(ValueType::String)).optional(),
        );
        let first = run(&schema, None, json!({"zones": ["a", "b", "c"]})).unwrap();
        let mut state = InstanceState::new("i-1");
        for (key, change) in &first.attributes {
            state.attributes.insert(key.clone(), change.new.clone());
        }
        assert!(run(&schema, Some(&state), json!({"zones": ["c", "a", "b"]})).is_none());
    }

    #[test]
    fn test_set_element_replacement() {
        let schema = SchemaMap::new().with(
            "zones",
            Attribute::set(Elem::primitive(ValueType::String)).optional(),
        );
        let a = hash_value(&Value::from("a"));
        let b = hash_value(&Value::from("b"));
        let state = InstanceState::new("i-1")
            .with("zones.#", "1")
            .with(format!("zones.{a}"), "a");
        let diff = run(&schema, Some(&state), json!({"zones": ["b"]})).unwrap();
        assert!(diff.get("zones.#").is_none());
        assert!(diff.get(&format!("zones.{a}")).unwrap().new_removed);
        assert_eq!(diff.get(&format!("zones.{b}")), Some(&AttributeDiff::new("", "b")));
    }

    #[test]
    fn test_removed_set_element_with_sparse_state() {
        let schema = SchemaMap::new().with(
            "rules",
            Attribute::set(Elem::block(
                SchemaMap::new()
                    .with("port", Attribute::int().required())
                    .with("proto", Attribute::string().optional()),
            ))
            .optional(),
        );
        let old_element = Value::Map(BTreeMap::from([("port".to_string(), Value::Int(80))]));
        let old_code = schema.get("rules").unwrap().hash_element(&old_element);
        let state = InstanceState::new("i-1")
            .with("rules.#", "1")
            .with(format!("rules.{old_code}.port"), "80");

        let diff = run(&schema, Some(&state), json!({"rules": [{"port": 443}]})).unwrap();
        assert_eq!(
            diff.get(&format!("rules.{old_code}.port")),
            Some(&AttributeDiff::removed("80"))
        );
        assert!(diff.get(&format!("rules.{old_code}.proto")).is_none());
        assert!(
            diff.attributes
                .iter()
                .any(|(k, c)| k.ends_with(".port") && c.new == "443" && !c.new_removed)
        );

        let view = schema.data(Some(&state), Some(&diff)).unwrap();
        let rules = view.get("rules").unwrap();
        assert_eq!(rules.as_set().unwrap().len(), 1);
        assert_eq!(view.get("rules.#").unwrap(), Value::Int(1));

        let saved = view.state().unwrap().unwrap();
        let old_prefix = format!("rules.{old_code}.");
        assert!(saved.attributes.keys().all(|k| !k.starts_with(&old_prefix)));
    }

    #[test]
    fn test_removed_set_element_ignores_suppress() {
        let always: crate::DiffSuppressFn = Arc::new(|_, _, _| true);
        let schema = SchemaMap::new().with(
            "zones",
            Attribute::set(Elem::Type(Box::new(
                Attribute::string().with_diff_suppress(always),
            )))
            .optional(),
        );
        let a = hash_value(&Value::from("a"));
        let state = InstanceState::new("i-1")
            .with("zones.#", "1")
            .with(format!("zones.{a}"), "a");

        let diff = run(&schema, Some(&state), json!({"zones": ["b"]})).unwrap();
        assert_eq!(
            diff.get(&format!("zones.{a}")),
            Some(&AttributeDiff::removed("a"))
        );

        let view = schema.data(Some(&state), Some(&diff)).unwrap();
        let zones = view.get("zones").unwrap();
        assert_eq!(zones.as_set().unwrap().len(), 1);
        assert!(!zones.as_set().unwrap().contains_code(a));
    }

    #[test]
    fn test_default_func_feeds_diff() {
        let provided: crate::DefaultFn = Arc::new(|| Some(RawValue::from("eu-west-1")));
        let nothing: crate::DefaultFn = Arc::new(|| None);
        let schema = SchemaMap::new()
            .with("name", Attribute::string().optional())
            .with("region", Attribute::string().optional().with_default_func(provided))
            .with("zone", Attribute::string().optional().with_default_func(nothing))
            .with(
                "profile",
                Attribute::string().optional().with_default_func(crate::env_default(
                    "SCHEMAKIT_TEST_UNSET_PROFILE",
                    Some(RawValue::from("default")),
                )),
            );

        let diff = run(&schema, None, json!({"name": "web"})).unwrap();
        assert_eq!(diff.get("region"), Some(&AttributeDiff::new("", "eu-west-1")));
        assert_eq!(diff.get("profile"), Some(&AttributeDiff::new("", "default")));
        assert!(diff.get("zone").is_none());

        let view = schema.data(None, Some(&diff)).unwrap();
        assert_eq!(view.get("region").unwrap(), Value::from("eu-west-1"));
        assert_eq!(view.get_ok("zone").unwrap(), None);
        assert_eq!(view.get_ok_exists("zone").unwrap(), None);
    }

    #[test]
    fn test_map_changes() {
        let schema = SchemaMap::new().with("labels", Attribute::map(ValueType::String).optional());
        let state = InstanceState::new("i-1")
            .with("labels.%", "2")
            .with("labels.env", "prod")
            .with("labels.team", "core");
        let diff = run(&schema, Some(&state), json!({"labels": {"env": "dev"}})).unwrap();
        assert_eq!(diff.get("labels.%"), Some(&AttributeDiff::new("2", "1")));
        assert_eq!(diff.get("labels.env"), Some(&AttributeDiff::new("prod", "dev")));
        assert!(diff.get("labels.team").unwrap().new_removed);
    }

    #[test]
    fn test_force_new_propagates() {
        let schema = SchemaMap::new()
            .with("image", Attribute::string().required().force_new())
            .with("name", Attribute::string().optional());
        let state = InstanceState::new("i-1")
            .with("image", "nginx:1")
            .with("name", "web");
        let diff = run(&schema, Some(&state), json!({"image": "nginx:2", "name": "api"})).unwrap();
        assert!(diff.requires_new());
        assert!(diff.get("image").unwrap().requires_new);
        assert!(!diff.get("name").unwrap().requires_new);
    }

    #[test]
    fn test_handle_requires_new_recomputes() {
        let schema = SchemaMap::new()
            .with("image", Attribute::string().required().force_new())
            .with("name", Attribute::string().optional())
            .with("ip", Attribute::string().computed());
        let state = InstanceState::new("i-1")
            .with("image", "nginx:1")
            .with("name", "web")
            .with("ip", "10.0.0.1");
        let diff = schema
            .diff::<()>(
                Some(&state),
                &config(json!({"image": "nginx:2", "name": "web"})),
                None,
                &(),
                true,
            )
            .unwrap()
            .unwrap();

        // unchanged attributes reappear with their old values
        assert_eq!(diff.get("name"), Some(&AttributeDiff::new("web", "web")));
        assert!(diff.get("image").unwrap().requires_new);
        let ip = diff.get("ip").unwrap();
        assert!(ip.new_computed);
        assert_eq!(ip.old, "10.0.0.1");
        assert!(!ip.requires_new);
    }

    #[test]
    fn test_tainted_state() {
        let schema = SchemaMap::new().with("name", Attribute::string().optional());
        let mut state = InstanceState::new("i-1").with("name", "web");
        state.tainted = true;
        let diff = schema
            .diff::<()>(Some(&state), &config(json!({"name": "web"})), None, &(), true)
            .unwrap()
            .unwrap();
        assert!(diff.destroy_tainted);
        assert!(diff.requires_new());
    }

    #[test]
    fn test_diff_suppress() {
        let case_insensitive: crate::DiffSuppressFn =
            Arc::new(|_, old, new| old.eq_ignore_ascii_case(new));
        let schema = SchemaMap::new().with(
            "region",
            Attribute::string().optional().with_diff_suppress(case_insensitive),
        );
        let state = InstanceState::new("i-1").with("region", "EU-WEST");
        assert!(run(&schema, Some(&state), json!({"region": "eu-west"})).is_none());
    }

    #[test]
    fn test_bool_normalized() {
        let schema = SchemaMap::new().with("enabled", Attribute::bool().optional());
        let state = InstanceState::new("i-1").with("enabled", "1");
        let diff = run(&schema, Some(&state), json!({"enabled": false})).unwrap();
        assert_eq!(diff.get("enabled"), Some(&AttributeDiff::new("true", "false")));
    }

    #[test]
    fn test_sensitive_flag() {
        let schema = SchemaMap::new().with("password", Attribute::string().optional().sensitive());
        let diff = run(&schema, None, json!({"password": "hunter2"})).unwrap();
        assert!(diff.get("password").unwrap().sensitive);
    }

    #[test]
    fn test_customize_hook() {
        let schema = SchemaMap::new().with("name", Attribute::string().optional());
        let hook = |diff: &mut InstanceDiff, force: &bool| -> Result<()> {
            if *force {
                diff.force_new("name");
            }
            Ok(())
        };
        let diff = schema
            .diff::<bool>(None, &config(json!({"name": "x"})), Some(&hook), &true, false)
            .unwrap()
            .unwrap();
        assert!(diff.requires_new());

        let failing = |_: &mut InstanceDiff, _: &()| -> Result<()> {
            Err(Error::Customize("quota exceeded".into()))
        };
        let err = schema
            .diff::<()>(None, &config(json!({"name": "x"})), Some(&failing), &(), false)
            .unwrap_err();
        assert_eq!(err, Error::Customize("quota exceeded".into()));
    }

    #[test]
    fn test_errors_yield_no_diff() {
        let schema = SchemaMap::new().with("count", Attribute::int().optional());
        let err = schema
            .diff::<()>(None, &config(json!({"count": "x", "extra": 1})), None, &(), false)
            .unwrap_err();
        assert_eq!(err, Error::SchemaViolation { key: "extra".into() });

        let err = schema
            .diff::<()>(None, &config(json!({"count": "x"})), None, &(), false)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_raw_values_from_code() {
        let schema = SchemaMap::new().with("count", Attribute::int().optional());
        let config = ResourceConfig::new().with("count", RawValue::from(3));
        let diff = schema
            .diff::<()>(None, &config, None, &(), false)
            .unwrap()
            .unwrap();
        assert_eq!(diff.get("count").unwrap().new, "3");
    }
}
