//! Declarative schema files
//!
//! A schema file is a JSON or TOML table of attribute definitions:
//!
//! ```toml
//! [name]
//! type = "string"
//! required = true
//! validate = { string_len_between = [1, 64] }
//!
//! [tags]
//! type = "set"
//! optional = true
//! elem = "string"
//!
//! [rule]
//! type = "list"
//! optional = true
//! max_items = 4
//!
//! [rule.block.port]
//! type = "int"
//! required = true
//! ```

use anyhow::{Context, Result, bail};
use regex::Regex;
use schemakit::validation;
use schemakit::{Attribute, Elem, RawValue, SchemaMap, ValueType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::inputs::read_document;

/// Top-level attribute definitions by name
pub type SchemaFile = BTreeMap<String, AttributeDef>;

/// One attribute as written in a schema file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDef {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub force_new: bool,
    #[serde(default)]
    pub sensitive: bool,
    pub default: Option<RawValue>,
    /// Element type of a list, set or map
    pub elem: Option<ElemDef>,
    /// Nested block fields of a list or set
    pub block: Option<BTreeMap<String, AttributeDef>>,
    pub max_items: Option<usize>,
    pub min_items: Option<usize>,
    #[serde(default)]
    pub conflicts_with: Vec<String>,
    pub deprecated: Option<String>,
    pub description: Option<String>,
    pub validate: Option<ValidateRule>,
}

/// Element definition: a bare type name or a full attribute
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElemDef {
    Type(ValueType),
    Attribute(Box<AttributeDef>),
}

/// Built-in validation rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateRule {
    Regex(String),
    IntBetween([i64; 2]),
    StringLenBetween([usize; 2]),
    OneOf(Vec<String>),
}

impl ValidateRule {
    fn build(&self, key: &str) -> Result<schemakit::ValidateFn> {
        Ok(match self {
            Self::Regex(pattern) => {
                let re = Regex::new(pattern)
                    .with_context(|| format!("{key}: invalid regex '{pattern}'"))?;
                validation::string_matches(re, None)
            }
            Self::IntBetween([min, max]) => validation::int_between(*min, *max),
            Self::StringLenBetween([min, max]) => validation::string_len_between(*min, *max),
            Self::OneOf(values) => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                validation::string_in_slice(&values, false)
            }
        })
    }
}

impl AttributeDef {
    /// Convert into a schema descriptor
    pub fn to_attribute(&self, key: &str) -> Result<Attribute> {
        let mut attr = match self.value_type {
            ValueType::List | ValueType::Set => {
                let elem = self.collection_elem(key)?;
                if self.value_type == ValueType::List {
                    Attribute::list(elem)
                } else {
                    Attribute::set(elem)
                }
            }
            ValueType::Map => {
                if self.block.is_some() {
                    bail!("{key}: a map cannot have block fields");
                }
                let elem_type = match &self.elem {
                    None => ValueType::String,
                    Some(ElemDef::Type(t)) => *t,
                    Some(ElemDef::Attribute(def)) => def.value_type,
                };
                Attribute::map(elem_type)
            }
            primitive => {
                if self.elem.is_some() || self.block.is_some() {
                    bail!("{key}: only lists, sets and maps take elem or block");
                }
                Attribute::new(primitive)
            }
        };

        attr.required = self.required;
        attr.optional = self.optional;
        attr.computed = self.computed;
        attr.force_new = self.force_new;
        attr.sensitive = self.sensitive;
        attr.max_items = self.max_items;
        attr.min_items = self.min_items;
        attr.conflicts_with.clone_from(&self.conflicts_with);
        attr.description.clone_from(&self.description);
        attr.deprecated.clone_from(&self.deprecated);

        if let Some(default) = &self.default {
            attr = attr.with_default(default.clone());
        }
        if let Some(rule) = &self.validate {
            attr = attr.with_validate(rule.build(key)?);
        }
        Ok(attr)
    }

    fn collection_elem(&self, key: &str) -> Result<Elem> {
        match (&self.elem, &self.block) {
            (Some(_), Some(_)) => bail!("{key}: set either elem or block, not both"),
            (None, None) => bail!("{key}: lists and sets need an elem or a block"),
            (Some(ElemDef::Type(t)), None) => Ok(Elem::primitive(*t)),
            (Some(ElemDef::Attribute(def)), None) => {
                Ok(Elem::Type(Box::new(def.to_attribute(key)?)))
            }
            (None, Some(fields)) => Ok(Elem::block(build_schema(fields, &format!("{key}."))?)),
        }
    }
}

fn build_schema(defs: &BTreeMap<String, AttributeDef>, prefix: &str) -> Result<SchemaMap> {
    let mut schema = SchemaMap::new();
    for (name, def) in defs {
        schema.insert(name.clone(), def.to_attribute(&format!("{prefix}{name}"))?);
    }
    Ok(schema)
}

/// Convert parsed definitions into a checked schema
pub fn to_schema(file: &SchemaFile) -> Result<SchemaMap> {
    let schema = build_schema(file, "")?;
    schema.internal_validate()?;
    Ok(schema)
}

/// Load and check a schema file
pub fn load_schema(path: &Path) -> Result<SchemaMap> {
    let file: SchemaFile = read_document(path)?;
    let schema =
        to_schema(&file).with_context(|| format!("Invalid schema in {}", path.display()))?;
    log::debug!(
        "Loaded schema with {} attributes from {}",
        schema.len(),
        path.display()
    );
    Ok(schema)
}
