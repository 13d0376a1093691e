//! Flat attribute encoding
//!
//! State and diffs address values by flat path:
//!
//! ```text
//! name            = "web"
//! ports.#         = "2"          list / set element count
//! ports.0         = "80"         list element
//! zones.8422...   = "eu-1"       set element, keyed by hash code
//! labels.%        = "1"          map entry count
//! labels.env      = "prod"
//! rules.0.port    = "443"        nested block field
//! ```
//!
//! An unknown collection is stored as the placeholder string at its count
//! key; an unknown primitive at its own key. A map entry cannot be named
//! `%`; coercion rejects it.

use crate::coerce::parse_bool;
use crate::error::{Error, Result};
use crate::raw::UNKNOWN_VARIABLE_VALUE;
use crate::schema::{Attribute, Elem, SchemaMap, ValueType};
use crate::set::Set;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Flat string-keyed attribute map
pub type FlatMap = BTreeMap<String, String>;

/// Write every attribute of `values` in flat form
pub fn flatten_all(schema: &SchemaMap, values: &BTreeMap<String, Value>) -> FlatMap {
    let mut out = FlatMap::new();
    for (name, attr) in schema.iter() {
        if let Some(value) = values.get(name) {
            flatten(name, attr, value, &mut out);
        }
    }
    out
}

/// Write one value under `prefix`
pub fn flatten(prefix: &str, attr: &Attribute, value: &Value, out: &mut FlatMap) {
    match (attr.value_type, value) {
        (ValueType::List | ValueType::Set, Value::Unknown) => {
            out.insert(format!("{prefix}.#"), UNKNOWN_VARIABLE_VALUE.to_string());
        }
        (ValueType::Map, Value::Unknown) => {
            out.insert(format!("{prefix}.%"), UNKNOWN_VARIABLE_VALUE.to_string());
        }
        (_, Value::List(items)) => {
            out.insert(format!("{prefix}.#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_element(&format!("{prefix}.{i}"), attr, item, out);
            }
        }
        (_, Value::Set(set)) => {
            out.insert(format!("{prefix}.#"), set.len().to_string());
            for (code, item) in set.iter() {
                flatten_element(&format!("{prefix}.{code}"), attr, item, out);
            }
        }
        (ValueType::Map, Value::Map(entries)) => {
            out.insert(format!("{prefix}.%"), entries.len().to_string());
            let elem = attr.elem_attribute();
            for (key, item) in entries {
                let entry_key = format!("{prefix}.{key}");
                match elem {
                    Some(elem) => flatten(&entry_key, elem, item, out),
                    None => {
                        if let Some(s) = item.flat_string() {
                            out.insert(entry_key, s);
                        }
                    }
                }
            }
        }
        (_, other) => {
            if let Some(s) = other.flat_string() {
                out.insert(prefix.to_string(), s);
            }
        }
    }
}

fn flatten_element(key: &str, attr: &Attribute, item: &Value, out: &mut FlatMap) {
    match &attr.elem {
        Some(Elem::Type(elem)) => flatten(key, elem, item, out),
        Some(Elem::Block(schema)) => flatten_block(key, schema, item, out),
        None => {}
    }
}

/// Write one nested block element; an unknown block marks every field unknown
pub fn flatten_block(prefix: &str, schema: &SchemaMap, value: &Value, out: &mut FlatMap) {
    for (name, attr) in schema.iter() {
        let field = match value {
            Value::Unknown => Some(&Value::Unknown),
            Value::Map(fields) => fields.get(name),
            _ => None,
        };
        if let Some(field) = field {
            flatten(&format!("{prefix}.{name}"), attr, field, out);
        }
    }
}

/// Read every attribute of the schema back out of flat form
pub fn expand_all(schema: &SchemaMap, flat: &FlatMap) -> Result<BTreeMap<String, Value>> {
    let mut values = BTreeMap::new();
    for (name, attr) in schema.iter() {
        if let Some(value) = expand(flat, name, attr)? {
            values.insert(name.to_string(), value);
        }
    }
    Ok(values)
}

/// Read the value stored under `prefix`, or `None` if nothing is stored
pub fn expand(flat: &FlatMap, prefix: &str, attr: &Attribute) -> Result<Option<Value>> {
    match attr.value_type {
        ValueType::List => {
            let Some(count) = read_count(flat, &format!("{prefix}.#"))? else {
                return Ok(None);
            };
            let Some(count) = count else {
                return Ok(Some(Value::Unknown));
            };
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                let item = expand_element(flat, &format!("{prefix}.{i}"), attr)?;
                items.push(item.unwrap_or_else(|| attr.zero_element()));
            }
            Ok(Some(Value::List(items)))
        }
        ValueType::Set => {
            let Some(count) = read_count(flat, &format!("{prefix}.#"))? else {
                return Ok(None);
            };
            if count.is_none() {
                return Ok(Some(Value::Unknown));
            }
            let mut set = Set::new();
            for segment in child_segments(flat, prefix) {
                let Ok(code) = segment.parse::<u64>() else {
                    continue;
                };
                if let Some(item) = expand_element(flat, &format!("{prefix}.{code}"), attr)? {
                    set.insert(code, item);
                }
            }
            Ok(Some(Value::Set(set)))
        }
        ValueType::Map => expand_map(flat, prefix, attr),
        primitive => match flat.get(prefix) {
            None => Ok(None),
            Some(s) => parse_flat(prefix, primitive, s).map(Some),
        },
    }
}

fn expand_element(flat: &FlatMap, key: &str, attr: &Attribute) -> Result<Option<Value>> {
    match &attr.elem {
        Some(Elem::Type(elem)) => expand(flat, key, elem),
        Some(Elem::Block(schema)) => expand_block(flat, key, schema),
        None => Ok(None),
    }
}

/// Read one nested block element, `None` if none of its fields are stored
pub fn expand_block(flat: &FlatMap, prefix: &str, schema: &SchemaMap) -> Result<Option<Value>> {
    let mut fields = BTreeMap::new();
    for (name, attr) in schema.iter() {
        if let Some(value) = expand(flat, &format!("{prefix}.{name}"), attr)? {
            fields.insert(name.to_string(), value);
        }
    }
    Ok((!fields.is_empty()).then_some(Value::Map(fields)))
}

fn expand_map(flat: &FlatMap, prefix: &str, attr: &Attribute) -> Result<Option<Value>> {
    let count_key = format!("{prefix}.%");
    if flat.get(&count_key).is_some_and(|c| c == UNKNOWN_VARIABLE_VALUE) {
        return Ok(Some(Value::Unknown));
    }
    let value_type = attr.elem_attribute().map_or(ValueType::String, |e| e.value_type);
    let start = format!("{prefix}.");
    let mut entries = BTreeMap::new();
    for (key, raw) in flat.range(start.clone()..) {
        let Some(entry) = key.strip_prefix(&start) else {
            break;
        };
        if entry == "%" {
            continue;
        }
        let value = if raw == UNKNOWN_VARIABLE_VALUE {
            Value::Unknown
        } else {
            parse_flat(key, value_type, raw)?
        };
        entries.insert(entry.to_string(), value);
    }
    if entries.is_empty() && !flat.contains_key(&count_key) {
        return Ok(None);
    }
    Ok(Some(Value::Map(entries)))
}

/// `Ok(None)` when absent, `Ok(Some(None))` when unknown
#[allow(clippy::option_option)]
fn read_count(flat: &FlatMap, key: &str) -> Result<Option<Option<usize>>> {
    match flat.get(key) {
        None => Ok(None),
        Some(s) if s == UNKNOWN_VARIABLE_VALUE => Ok(Some(None)),
        Some(s) if s.is_empty() => Ok(Some(Some(0))),
        Some(s) => s
            .parse()
            .map(|n| Some(Some(n)))
            .map_err(|_| Error::type_mismatch(key, "element count", format!("string {s:?}"))),
    }
}

/// Distinct first path segments below `prefix`, skipping the count key
fn child_segments<'a>(flat: &'a FlatMap, prefix: &str) -> BTreeSet<&'a str> {
    let start = format!("{prefix}.");
    flat.range(start.clone()..)
        .map_while(|(key, _)| key.strip_prefix(&start))
        .map(|rest| rest.split('.').next().unwrap_or(rest))
        .filter(|segment| *segment != "#")
        .collect()
}

/// Parse a stored primitive; the empty string reads as the zero value
pub fn parse_flat(key: &str, value_type: ValueType, s: &str) -> Result<Value> {
    if s == UNKNOWN_VARIABLE_VALUE {
        return Ok(Value::Unknown);
    }
    if s.is_empty() {
        return Ok(Value::zero(value_type));
    }
    let mismatch = || Error::type_mismatch(key, value_type, format!("string {s:?}"));
    match value_type {
        ValueType::Bool => parse_bool(s).map(Value::Bool).ok_or_else(mismatch),
        ValueType::Int => s.parse().map(Value::Int).map_err(|_| mismatch()),
        ValueType::Float => s.parse().map(Value::Float).map_err(|_| mismatch()),
        ValueType::String => Ok(Value::String(s.to_string())),
        ValueType::List | ValueType::Set | ValueType::Map => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::set::hash_value;

    fn schema() -> SchemaMap {
        SchemaMap::new()
            .with("name", Attribute::string().optional())
            .with("count", Attribute::int().optional())
            .with("ports", Attribute::list(Elem::primitive(ValueType::Int)).optional())
            .with("zones", Attribute::set(Elem::primitive(ValueType::String)).optional())
            .with("labels", Attribute::map(ValueType::String).optional())
            .with(
                "rules",
                Attribute::list(Elem::block(
                    SchemaMap::new()
                        .with("port", Attribute::int().required())
                        .with("proto", Attribute::string().optional()),
                ))
                .optional(),
            )
    }

    fn flat(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_flatten_layout() {
        let mut zones = Set::new();
        zones.insert(hash_value(&Value::from("eu-1")), Value::from("eu-1"));
        let mut rule = BTreeMap::new();
        rule.insert("port".to_string(), Value::Int(443));
        let mut labels = BTreeMap::new();
        labels.insert("app.kubernetes.io/name".to_string(), Value::from("web"));

        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::from("web"));
        values.insert("ports".to_string(), Value::List(vec![Value::Int(80), Value::Int(8080)]));
        values.insert("zones".to_string(), Value::Set(zones));
        values.insert("labels".to_string(), Value::Map(labels));
        values.insert("rules".to_string(), Value::List(vec![Value::Map(rule)]));

        let out = flatten_all(&schema(), &values);
        let code = hash_value(&Value::from("eu-1"));
        assert_eq!(out["name"], "web");
        assert_eq!(out["ports.#"], "2");
        assert_eq!(out["ports.1"], "8080");
        assert_eq!(out["zones.#"], "1");
        assert_eq!(out[&format!("zones.{code}")], "eu-1");
        assert_eq!(out["labels.%"], "1");
        assert_eq!(out["labels.app.kubernetes.io/name"], "web");
        assert_eq!(out["rules.0.port"], "443");
        assert!(!out.contains_key("rules.0.proto"));
    }

    #[test]
    fn test_expand_restores_values() {
        let code = hash_value(&Value::from("eu-1"));
        let code_key = format!("zones.{code}");
        let stored = flat(&[
            ("name", "web"),
            ("count", ""),
            ("ports.#", "1"),
            ("ports.0", "80"),
            ("zones.#", "1"),
            (code_key.as_str(), "eu-1"),
            ("labels.%", "1"),
            ("labels.env", "prod"),
            ("rules.#", "1"),
            ("rules.0.port", "443"),
        ]);
        let values = expand_all(&schema(), &stored).unwrap();
        assert_eq!(values["name"], Value::from("web"));
        assert_eq!(values["count"], Value::Int(0));
        assert_eq!(values["ports"], Value::List(vec![Value::Int(80)]));
        assert!(values["zones"].as_set().unwrap().contains_code(code));
        assert_eq!(values["labels"].as_map().unwrap()["env"], Value::from("prod"));
        let rule = &values["rules"].as_list().unwrap()[0];
        assert_eq!(rule.as_map().unwrap()["port"], Value::Int(443));
    }

    #[test]
    fn test_unknown_markers() {
        let stored = flat(&[
            ("name", UNKNOWN_VARIABLE_VALUE),
            ("ports.#", UNKNOWN_VARIABLE_VALUE),
            ("labels.%", UNKNOWN_VARIABLE_VALUE),
        ]);
        let values = expand_all(&schema(), &stored).unwrap();
        assert_eq!(values["name"], Value::Unknown);
        assert_eq!(values["ports"], Value::Unknown);
        assert_eq!(values["labels"], Value::Unknown);
        assert!(!values.contains_key("zones"));

        let mut out = FlatMap::new();
        flatten("ports", schema().get("ports").unwrap(), &Value::Unknown, &mut out);
        assert_eq!(out["ports.#"], UNKNOWN_VARIABLE_VALUE);
    }

    #[test]
    fn test_expand_bad_stored_value() {
        let stored = flat(&[("count", "many")]);
        let err = expand_all(&schema(), &stored).unwrap_err();
        assert_eq!(err.key(), Some("count"));
    }

    #[test]
    fn test_expand_empty_map_with_count() {
        let stored = flat(&[("labels.%", "0")]);
        let values = expand_all(&schema(), &stored).unwrap();
        assert_eq!(values["labels"], Value::Map(BTreeMap::new()));
    }
}
