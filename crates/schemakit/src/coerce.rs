//! Value coercion - raw configuration into schema-typed values
//!
//! Coercion is the only place where untyped input meets the schema.
//! Scalars are weakly decoded (`"42"` is a valid int, `1` a valid string),
//! defaults are applied to absent attributes, and validation rules run on
//! every known value. The computed placeholder becomes [`Value::Unknown`];
//! a set or map holding an unknown element is unknown as a whole.

use crate::config::ResourceConfig;
use crate::error::{Error, Result};
use crate::raw::RawValue;
use crate::schema::{Attribute, Elem, SchemaMap, ValueType};
use crate::set::Set;
use crate::value::Value;
use std::collections::BTreeMap;

/// Where a raw value comes from
///
/// Configuration is checked in full. Values written through a
/// [`ResourceView`](crate::ResourceView) are only type-coerced: computed
/// attributes may be written, and defaults, required fields and
/// validation rules do not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Config,
    Write,
}

/// Coerce a raw value present in the configuration
pub fn coerce_value(key: &str, attr: &Attribute, raw: &RawValue) -> Result<Value> {
    coerce_from(Source::Config, key, attr, raw)
}

pub(crate) fn coerce_from(
    source: Source,
    key: &str,
    attr: &Attribute,
    raw: &RawValue,
) -> Result<Value> {
    if raw.is_computed() {
        return Ok(Value::Unknown);
    }

    let value = match attr.value_type {
        ValueType::Bool => coerce_bool(key, raw)?,
        ValueType::Int => coerce_int(key, raw)?,
        ValueType::Float => coerce_float(key, raw)?,
        ValueType::String => coerce_string(key, raw)?,
        ValueType::List => Value::List(coerce_elements(source, key, attr, raw)?),
        ValueType::Set => {
            let items = coerce_elements(source, key, attr, raw)?;
            if items.iter().any(Value::contains_unknown) {
                Value::Unknown
            } else {
                let mut set = Set::new();
                for item in items {
                    set.insert(attr.hash_element(&item), item);
                }
                Value::Set(set)
            }
        }
        ValueType::Map => coerce_map(source, key, attr, raw)?,
    };

    if source == Source::Config
        && let Some(validate) = &attr.validate
        && !value.contains_unknown()
    {
        validate(&value, key).map_err(|message| Error::validation(key, message))?;
    }
    Ok(value)
}

/// Coerce one attribute of a block, applying defaults when it is absent
///
/// `siblings` is the raw block the attribute lives in, used for
/// `conflicts_with`. Returns `None` when the attribute is unset and has no
/// default.
pub fn coerce_field(
    key: &str,
    attr: &Attribute,
    raw: Option<&RawValue>,
    siblings: &BTreeMap<String, RawValue>,
) -> Result<Option<Value>> {
    let Some(raw) = raw.filter(|r| !r.is_null()) else {
        if attr.required {
            return Err(Error::MissingRequired {
                key: key.to_string(),
            });
        }
        return match attr.default_value() {
            Some(default) => coerce_value(key, attr, &default).map(Some),
            None => Ok(None),
        };
    };

    if attr.is_computed_only() {
        return Err(Error::validation(key, "computed attribute cannot be set"));
    }
    if let Some(message) = &attr.deprecated {
        log::warn!("{key} is deprecated: {message}");
    }
    for other in &attr.conflicts_with {
        if siblings.get(other).is_some_and(|v| !v.is_null()) {
            return Err(Error::validation(key, format!("conflicts with {other}")));
        }
    }
    coerce_value(key, attr, raw).map(Some)
}

/// Coerce one nested block element from configuration
pub fn coerce_block(key: &str, schema: &SchemaMap, raw: &RawValue) -> Result<Value> {
    coerce_block_from(Source::Config, key, schema, raw)
}

pub(crate) fn coerce_block_from(
    source: Source,
    key: &str,
    schema: &SchemaMap,
    raw: &RawValue,
) -> Result<Value> {
    let empty = BTreeMap::new();
    let fields = match raw {
        RawValue::Computed => return Ok(Value::Unknown),
        RawValue::Mapping(fields) => fields,
        RawValue::Null => &empty,
        other => return Err(Error::type_mismatch(key, "block", other.kind())),
    };

    if let Some(name) = fields.keys().find(|name| !schema.contains_key(name)) {
        return Err(Error::SchemaViolation {
            key: format!("{key}.{name}"),
        });
    }

    let mut block = BTreeMap::new();
    for (name, attr) in schema.iter() {
        let field_key = format!("{key}.{name}");
        let value = match source {
            Source::Config => coerce_field(&field_key, attr, fields.get(name), fields)?,
            Source::Write => match fields.get(name).filter(|r| !r.is_null()) {
                Some(raw) => Some(coerce_from(source, &field_key, attr, raw)?),
                None => None,
            },
        };
        if let Some(value) = value {
            block.insert(name.to_string(), value);
        }
    }
    Ok(Value::Map(block))
}

impl SchemaMap {
    /// Check a configuration, collecting every error instead of the first
    pub fn validate(&self, config: &ResourceConfig) -> Vec<Error> {
        let mut errors: Vec<Error> = config
            .iter()
            .filter(|(name, _)| !self.contains_key(name))
            .map(|(name, _)| Error::SchemaViolation {
                key: name.to_string(),
            })
            .collect();
        for (name, attr) in self.iter() {
            if let Err(err) = coerce_field(name, attr, config.get(name), config.raw()) {
                errors.push(err);
            }
        }
        errors
    }

    /// Coerce a whole configuration, failing on the first error
    pub(crate) fn coerce(&self, config: &ResourceConfig) -> Result<BTreeMap<String, Value>> {
        if let Some((name, _)) = config.iter().find(|(name, _)| !self.contains_key(name)) {
            return Err(Error::SchemaViolation {
                key: name.to_string(),
            });
        }
        let mut values = BTreeMap::new();
        for (name, attr) in self.iter() {
            if let Some(value) = coerce_field(name, attr, config.get(name), config.raw())? {
                values.insert(name.to_string(), value);
            }
        }
        Ok(values)
    }
}

fn coerce_elements(
    source: Source,
    key: &str,
    attr: &Attribute,
    raw: &RawValue,
) -> Result<Vec<Value>> {
    let items = match raw {
        RawValue::Null => return Ok(Vec::new()),
        RawValue::Sequence(items) => items,
        other => return Err(Error::type_mismatch(key, attr.value_type, other.kind())),
    };

    if source == Source::Config
        && let Some(max) = attr.max_items
        && items.len() > max
    {
        return Err(Error::validation(
            key,
            format!("attribute supports {max} item maximum, config has {} declared", items.len()),
        ));
    }
    if source == Source::Config
        && let Some(min) = attr.min_items
        && items.len() < min
    {
        return Err(Error::validation(
            key,
            format!("attribute supports {min} item minimum, config has {} declared", items.len()),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let item_key = format!("{key}.{i}");
            match &attr.elem {
                Some(Elem::Type(elem)) => coerce_from(source, &item_key, elem, item),
                Some(Elem::Block(schema)) => coerce_block_from(source, &item_key, schema, item),
                None => Err(Error::invalid_schema(key, "collection has no element type")),
            }
        })
        .collect()
}

fn coerce_map(source: Source, key: &str, attr: &Attribute, raw: &RawValue) -> Result<Value> {
    let entries = match raw {
        RawValue::Null => return Ok(Value::Map(BTreeMap::new())),
        RawValue::Mapping(entries) => entries,
        other => return Err(Error::type_mismatch(key, ValueType::Map, other.kind())),
    };
    let Some(elem) = attr.elem_attribute() else {
        return Err(Error::invalid_schema(key, "map values must be primitive"));
    };

    let mut map = BTreeMap::new();
    for (name, item) in entries {
        // `%` is where the entry count is stored
        if name == "%" {
            return Err(Error::validation(
                format!("{key}.%"),
                "map keys cannot be \"%\"",
            ));
        }
        let value = coerce_from(source, &format!("{key}.{name}"), elem, item)?;
        if value.is_unknown() {
            return Ok(Value::Unknown);
        }
        map.insert(name.clone(), value);
    }
    Ok(Value::Map(map))
}

fn coerce_bool(key: &str, raw: &RawValue) -> Result<Value> {
    let b = match raw {
        RawValue::Null => false,
        RawValue::Bool(b) => *b,
        RawValue::Int(i) => *i != 0,
        RawValue::String(s) => parse_bool(s)
            .ok_or_else(|| Error::type_mismatch(key, ValueType::Bool, raw.kind()))?,
        other => return Err(Error::type_mismatch(key, ValueType::Bool, other.kind())),
    };
    Ok(Value::Bool(b))
}

fn coerce_int(key: &str, raw: &RawValue) -> Result<Value> {
    let i = match raw {
        RawValue::Null => 0,
        RawValue::Int(i) => *i,
        RawValue::Bool(b) => i64::from(*b),
        RawValue::Float(f) if f.fract() == 0.0 => *f as i64,
        RawValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::type_mismatch(key, ValueType::Int, raw.kind()))?,
        other => return Err(Error::type_mismatch(key, ValueType::Int, other.kind())),
    };
    Ok(Value::Int(i))
}

fn coerce_float(key: &str, raw: &RawValue) -> Result<Value> {
    let f = match raw {
        RawValue::Null => 0.0,
        RawValue::Float(f) => *f,
        RawValue::Int(i) => *i as f64,
        RawValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::type_mismatch(key, ValueType::Float, raw.kind()))?,
        other => return Err(Error::type_mismatch(key, ValueType::Float, other.kind())),
    };
    Ok(Value::Float(f))
}

fn coerce_string(key: &str, raw: &RawValue) -> Result<Value> {
    let s = match raw {
        RawValue::Null => String::new(),
        RawValue::String(s) => s.clone(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
        other => return Err(Error::type_mismatch(key, ValueType::String, other.kind())),
    };
    Ok(Value::String(s))
}

/// Boolean spellings accepted from strings
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
