//! Resource view - merged state and diff
//!
//! A [`ResourceView`] answers "what is the value of this attribute" for
//! business logic, preferring values written through [`ResourceView::set`],
//! then the diff, then the prior state, then the schema default.

use crate::coerce::{Source, coerce_block_from, coerce_from};
use crate::diff::InstanceDiff;
use crate::error::{Error, Result};
use crate::flatmap::{FlatMap, expand, expand_all, expand_block, flatten, flatten_all, parse_flat};
use crate::raw::{RawValue, UNKNOWN_VARIABLE_VALUE};
use crate::schema::{Attribute, Elem, Lookup, SchemaMap, ValueType};
use crate::state::InstanceState;
use crate::value::Value;
use std::collections::BTreeMap;

/// Read/write projection over (schema, state, diff)
#[derive(Debug, Clone)]
pub struct ResourceView<'a> {
    schema: &'a SchemaMap,
    state: Option<InstanceState>,
    diff: Option<InstanceDiff>,
    /// Effective flat attributes: state, then diff, then writes
    current: FlatMap,
    id: String,
    new_resource: bool,
}

impl SchemaMap {
    /// Materialize a view over `state` with `diff` applied
    ///
    /// Fails with [`Error::Consistency`] when the diff references a path
    /// the schema does not declare.
    pub fn data(
        &self,
        state: Option<&InstanceState>,
        diff: Option<&InstanceDiff>,
    ) -> Result<ResourceView<'_>> {
        let mut current = state.map(|s| s.attributes.clone()).unwrap_or_default();

        if let Some(diff) = diff {
            for (key, change) in &diff.attributes {
                if self.lookup(key).is_none() {
                    return Err(Error::Consistency { key: key.clone() });
                }
                if change.new_removed {
                    current.remove(key);
                    let nested = format!("{key}.");
                    current.retain(|k, _| !k.starts_with(&nested));
                } else if change.new_computed {
                    current.insert(key.clone(), UNKNOWN_VARIABLE_VALUE.to_string());
                } else {
                    current.insert(key.clone(), change.new.clone());
                }
            }
        }

        let replacing = diff.is_some_and(InstanceDiff::requires_new);
        let id = match state {
            Some(state) if !replacing => state.id.clone(),
            _ => String::new(),
        };
        log::debug!(
            "materialized view with {} attributes (replacing: {replacing})",
            current.len()
        );

        Ok(ResourceView {
            schema: self,
            state: state.cloned(),
            diff: diff.cloned(),
            current,
            new_resource: id.is_empty(),
            id,
        })
    }
}

impl ResourceView<'_> {
    /// Effective value of `key`
    ///
    /// Falls back to the schema default, then to the zero value. Values
    /// still computed read as [`Value::Unknown`].
    pub fn get(&self, key: &str) -> Result<Value> {
        let lookup = self.lookup(key)?;
        match read(&self.current, key, lookup)? {
            Some(value) => Ok(value),
            None => fallback(key, lookup),
        }
    }

    /// Value of `key` if it is known and not the zero value
    pub fn get_ok(&self, key: &str) -> Result<Option<Value>> {
        let value = self.get(key)?;
        Ok((!value.is_unknown() && !value.is_zero()).then_some(value))
    }

    /// Value of `key` if it is known and present, even when zero
    pub fn get_ok_exists(&self, key: &str) -> Result<Option<Value>> {
        let lookup = self.lookup(key)?;
        Ok(read(&self.current, key, lookup)?.filter(|v| !v.is_unknown()))
    }

    /// Prior and effective value of `key`
    pub fn get_change(&self, key: &str) -> Result<(Value, Value)> {
        let lookup = self.lookup(key)?;
        let old = match &self.state {
            Some(state) => read(&state.attributes, key, lookup)?,
            None => None,
        };
        Ok((old.unwrap_or_else(|| lookup.zero()), self.get(key)?))
    }

    pub fn has_change(&self, key: &str) -> Result<bool> {
        let (old, new) = self.get_change(key)?;
        Ok(old != new)
    }

    /// Write a value without recomputing the diff
    ///
    /// `key` may name a top-level attribute, a list element, a map entry
    /// or a field of a block element. Counts and individual set elements
    /// cannot be written.
    pub fn set(&mut self, key: &str, value: impl Into<RawValue>) -> Result<()> {
        let raw = value.into();
        let (top, rest) = match key.split_once('.') {
            Some((top, rest)) => (top, Some(rest)),
            None => (key, None),
        };
        let schema = self.schema;
        let top_attr = schema.get(top).ok_or_else(|| schema_violation(key))?;

        let new = match self.lookup(key)? {
            Lookup::Count => {
                return Err(Error::validation(key, "element counts cannot be set"));
            }
            Lookup::Attribute(attr) => coerce_from(Source::Write, key, attr, &raw)?,
            Lookup::Block(schema) => coerce_block_from(Source::Write, key, schema, &raw)?,
        };

        let value = match rest {
            None => new,
            Some(rest) => {
                let mut value = self.get(top)?;
                let parts: Vec<&str> = rest.split('.').collect();
                write_path(key, top_attr, &mut value, &parts, new)?;
                value
            }
        };

        let nested = format!("{top}.");
        self.current.retain(|k, _| k != top && !k.starts_with(&nested));
        flatten(top, top_attr, &value, &mut self.current);
        log::trace!("set {key}");
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// No prior resource exists, or it is being replaced
    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn diff(&self) -> Option<&InstanceDiff> {
        self.diff.as_ref()
    }

    pub fn schema(&self) -> &SchemaMap {
        self.schema
    }

    /// All effective top-level values, unknowns included
    pub fn values(&self) -> Result<BTreeMap<String, Value>> {
        expand_all(self.schema, &self.current)
    }

    /// New state from the effective values
    ///
    /// `None` when the id is empty. Values still unknown are left out.
    pub fn state(&self) -> Result<Option<InstanceState>> {
        if self.id.is_empty() {
            return Ok(None);
        }
        let mut attributes = flatten_all(self.schema, &self.values()?);
        attributes.retain(|_, v| v != UNKNOWN_VARIABLE_VALUE);
        attributes.insert("id".to_string(), self.id.clone());
        Ok(Some(InstanceState {
            id: self.id.clone(),
            attributes,
            tainted: false,
        }))
    }

    fn lookup(&self, key: &str) -> Result<Lookup<'_>> {
        self.schema.lookup(key).ok_or_else(|| schema_violation(key))
    }
}

fn schema_violation(key: &str) -> Error {
    Error::SchemaViolation {
        key: key.to_string(),
    }
}

fn read(flat: &FlatMap, key: &str, lookup: Lookup<'_>) -> Result<Option<Value>> {
    match lookup {
        Lookup::Attribute(attr) => expand(flat, key, attr),
        Lookup::Block(schema) => expand_block(flat, key, schema),
        Lookup::Count => match flat.get(key) {
            Some(s) => parse_flat(key, ValueType::Int, s).map(Some),
            None => Ok(None),
        },
    }
}

fn fallback(key: &str, lookup: Lookup<'_>) -> Result<Value> {
    if let Lookup::Attribute(attr) = lookup
        && let Some(default) = attr.default_value()
    {
        return coerce_from(Source::Config, key, attr, &default);
    }
    Ok(lookup.zero())
}

/// Replace the value at `parts` inside `value`
fn write_path(
    key: &str,
    attr: &Attribute,
    value: &mut Value,
    parts: &[&str],
    new: Value,
) -> Result<()> {
    let Some((first, rest)) = parts.split_first() else {
        *value = new;
        return Ok(());
    };
    match (attr.value_type, value) {
        (ValueType::List, Value::List(items)) => {
            let len = items.len();
            let item = first
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| {
                    Error::validation(key, format!("index {first} is out of range for {len} elements"))
                })?;
            match &attr.elem {
                Some(Elem::Type(elem)) => write_path(key, elem, item, rest, new),
                Some(Elem::Block(schema)) => write_field(key, schema, item, rest, new),
                None => Err(schema_violation(key)),
            }
        }
        // map keys may contain dots
        (ValueType::Map, Value::Map(entries)) => {
            entries.insert(parts.join("."), new);
            Ok(())
        }
        (ValueType::Set, _) => Err(Error::validation(
            key,
            "set elements cannot be set individually",
        )),
        (_, Value::Unknown) => Err(Error::validation(
            key,
            "cannot write inside a value that is not known yet",
        )),
        _ => Err(schema_violation(key)),
    }
}

fn write_field(
    key: &str,
    schema: &SchemaMap,
    block: &mut Value,
    parts: &[&str],
    new: Value,
) -> Result<()> {
    let Some((name, rest)) = parts.split_first() else {
        *block = new;
        return Ok(());
    };
    let attr = schema.get(name).ok_or_else(|| schema_violation(key))?;
    let Value::Map(fields) = block else {
        return Err(Error::validation(
            key,
            "cannot write inside a value that is not known yet",
        ));
    };
    if rest.is_empty() {
        fields.insert((*name).to_string(), new);
        return Ok(());
    }
    let field = fields
        .entry((*name).to_string())
        .or_insert_with(|| Value::zero(attr.value_type));
    write_path(key, attr, field, rest, new)
}
