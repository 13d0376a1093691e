//! Schema model - declarative attribute descriptors
//!
//! A [`SchemaMap`] maps attribute names to [`Attribute`] descriptors. The
//! schema is an ordinary value passed by reference into every operation;
//! there is no global registry.

use crate::error::{Error, Result};
use crate::raw::RawValue;
use crate::set::hash_value;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Declared kind of an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    List,
    Set,
    Map,
}

impl ValueType {
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float | Self::String)
    }

    pub fn is_collection(&self) -> bool {
        !self.is_primitive()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Custom validation rule: `(value, key) -> Ok or message`
pub type ValidateFn = Arc<dyn Fn(&Value, &str) -> std::result::Result<(), String> + Send + Sync>;

/// Default provider, consulted when the configuration leaves a value unset
pub type DefaultFn = Arc<dyn Fn() -> Option<RawValue> + Send + Sync>;

/// Diff suppression: `(key, old, new) -> suppress?`
pub type DiffSuppressFn = Arc<dyn Fn(&str, &str, &str) -> bool + Send + Sync>;

/// Custom hash for set elements
pub type SetHashFn = Arc<dyn Fn(&Value) -> u64 + Send + Sync>;

/// Default for an attribute that is absent from the configuration
#[derive(Clone)]
pub enum DefaultValue {
    Static(RawValue),
    Func(DefaultFn),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(raw) => f.debug_tuple("Static").field(raw).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Default provider reading an environment variable, falling back to
/// `fallback` when the variable is unset
pub fn env_default(var: impl Into<String>, fallback: Option<RawValue>) -> DefaultFn {
    let var = var.into();
    Arc::new(move || match std::env::var(&var) {
        Ok(value) => Some(RawValue::from(value)),
        Err(_) => fallback.clone(),
    })
}

/// Element descriptor of a list, set or map
#[derive(Debug, Clone)]
pub enum Elem {
    /// Elements are plain values of this descriptor
    Type(Box<Attribute>),
    /// Elements are nested blocks
    Block(SchemaMap),
}

impl Elem {
    pub fn primitive(value_type: ValueType) -> Self {
        Self::Type(Box::new(Attribute::new(value_type)))
    }

    pub fn block(schema: SchemaMap) -> Self {
        Self::Block(schema)
    }
}

/// Descriptor for a single attribute
#[derive(Clone)]
pub struct Attribute {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    /// Value may be decided at apply time instead of by configuration
    pub computed: bool,
    /// A change cannot be applied in place
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<DefaultValue>,
    pub validate: Option<ValidateFn>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub set_hash: Option<SetHashFn>,
    pub elem: Option<Elem>,
    pub max_items: Option<usize>,
    pub min_items: Option<usize>,
    /// Sibling attributes that may not be configured together with this one
    pub conflicts_with: Vec<String>,
    pub description: Option<String>,
    /// Warning logged when the attribute is configured
    pub deprecated: Option<String>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .field("sensitive", &self.sensitive)
            .field("default", &self.default)
            .field("validate", &self.validate.is_some())
            .field("diff_suppress", &self.diff_suppress.is_some())
            .field("set_hash", &self.set_hash.is_some())
            .field("elem", &self.elem)
            .field("max_items", &self.max_items)
            .field("min_items", &self.min_items)
            .field("conflicts_with", &self.conflicts_with)
            .finish_non_exhaustive()
    }
}

impl Attribute {
    /// A bare descriptor of the given type with no flags set
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            validate: None,
            diff_suppress: None,
            set_hash: None,
            elem: None,
            max_items: None,
            min_items: None,
            conflicts_with: Vec::new(),
            description: None,
            deprecated: None,
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn int() -> Self {
        Self::new(ValueType::Int)
    }

    pub fn float() -> Self {
        Self::new(ValueType::Float)
    }

    pub fn bool() -> Self {
        Self::new(ValueType::Bool)
    }

    pub fn list(elem: Elem) -> Self {
        Self {
            elem: Some(elem),
            ..Self::new(ValueType::List)
        }
    }

    pub fn set(elem: Elem) -> Self {
        Self {
            elem: Some(elem),
            ..Self::new(ValueType::Set)
        }
    }

    /// A map whose values have the given primitive type
    pub fn map(value_type: ValueType) -> Self {
        Self {
            elem: Some(Elem::primitive(value_type)),
            ..Self::new(ValueType::Map)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<RawValue>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn with_default_func(mut self, func: DefaultFn) -> Self {
        self.default = Some(DefaultValue::Func(func));
        self
    }

    pub fn with_validate(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_diff_suppress(mut self, suppress: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    pub fn with_set_hash(mut self, hash: SetHashFn) -> Self {
        self.set_hash = Some(hash);
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn conflicts_with(mut self, keys: &[&str]) -> Self {
        self.conflicts_with = keys.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    /// Computed and never set by configuration
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Can be set by configuration
    pub fn is_configurable(&self) -> bool {
        self.required || self.optional
    }

    /// Resolve the default, calling the provider if there is one
    pub fn default_value(&self) -> Option<RawValue> {
        match self.default.as_ref()? {
            DefaultValue::Static(raw) => Some(raw.clone()),
            DefaultValue::Func(func) => func(),
        }
    }

    /// Element descriptor for collections of plain values
    pub fn elem_attribute(&self) -> Option<&Attribute> {
        match self.elem.as_ref()? {
            Elem::Type(attr) => Some(attr),
            Elem::Block(_) => None,
        }
    }

    /// Child schema for collections of nested blocks
    pub fn elem_block(&self) -> Option<&SchemaMap> {
        match self.elem.as_ref()? {
            Elem::Block(schema) => Some(schema),
            Elem::Type(_) => None,
        }
    }

    /// Zero value of one element of this collection
    pub fn zero_element(&self) -> Value {
        match &self.elem {
            Some(Elem::Type(attr)) => Value::zero(attr.value_type),
            Some(Elem::Block(_)) | None => Value::Map(BTreeMap::new()),
        }
    }

    /// Hash code of one element of this set
    ///
    /// Block elements hash only their configurable fields, so values filled
    /// in at apply time do not move an element to a new code.
    pub fn hash_element(&self, value: &Value) -> u64 {
        if let Some(hash) = &self.set_hash {
            return hash(value);
        }
        match (&self.elem, value) {
            (Some(Elem::Block(schema)), Value::Map(fields)) => {
                let configurable = fields
                    .iter()
                    .filter(|(name, _)| schema.get(name).is_some_and(Attribute::is_configurable))
                    .map(|(name, v)| (name.clone(), v.clone()))
                    .collect();
                hash_value(&Value::Map(configurable))
            }
            _ => hash_value(value),
        }
    }

    /// Check the descriptor's invariants
    fn internal_validate(&self, key: &str, siblings: &SchemaMap) -> Result<()> {
        if self.required && self.optional {
            return Err(Error::invalid_schema(key, "required and optional are exclusive"));
        }
        if self.required && self.computed {
            return Err(Error::invalid_schema(key, "required attributes cannot be computed"));
        }
        if !self.required && !self.optional && !self.computed {
            return Err(Error::invalid_schema(
                key,
                "one of required, optional or computed must be set",
            ));
        }
        if self.default.is_some() {
            if self.required {
                return Err(Error::invalid_schema(key, "required attributes cannot have a default"));
            }
            if self.is_computed_only() {
                return Err(Error::invalid_schema(key, "computed-only attributes cannot have a default"));
            }
            if self.value_type.is_collection() {
                return Err(Error::invalid_schema(
                    key,
                    format!("a default is not valid for {} attributes", self.value_type),
                ));
            }
        }
        if self.is_computed_only() {
            if self.validate.is_some() {
                return Err(Error::invalid_schema(key, "computed-only attributes cannot be validated"));
            }
            if !self.conflicts_with.is_empty() {
                return Err(Error::invalid_schema(key, "computed-only attributes cannot conflict"));
            }
        }
        for other in &self.conflicts_with {
            if other == key || !siblings.contains_key(other) {
                return Err(Error::invalid_schema(
                    key,
                    format!("conflicts_with references unknown attribute {other}"),
                ));
            }
        }
        if (self.max_items.is_some() || self.min_items.is_some())
            && !matches!(self.value_type, ValueType::List | ValueType::Set)
        {
            return Err(Error::invalid_schema(key, "max_items and min_items apply to lists and sets"));
        }
        if let (Some(min), Some(max)) = (self.min_items, self.max_items)
            && min > max
        {
            return Err(Error::invalid_schema(key, "min_items is greater than max_items"));
        }
        self.validate_elem(key)
    }

    fn validate_elem(&self, key: &str) -> Result<()> {
        match (&self.elem, self.value_type) {
            (None, ValueType::List | ValueType::Set | ValueType::Map) => Err(
                Error::invalid_schema(key, format!("{} attributes need an element type", self.value_type)),
            ),
            (Some(_), t) if t.is_primitive() => Err(Error::invalid_schema(
                key,
                format!("{t} attributes cannot have an element type"),
            )),
            (Some(Elem::Block(_)), ValueType::Map) => Err(Error::invalid_schema(
                key,
                "map values must be primitive",
            )),
            (Some(Elem::Type(elem)), ValueType::Map) if !elem.value_type.is_primitive() => Err(
                Error::invalid_schema(key, "map values must be primitive"),
            ),
            (Some(Elem::Type(elem)), _) => elem.validate_elem(&format!("{key}.*")),
            (Some(Elem::Block(schema)), _) => schema.validate_with_prefix(&format!("{key}.*.")),
            (None, _) => Ok(()),
        }
    }
}

/// What a flat path points at
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// A declared attribute, or a plain collection element
    Attribute(&'a Attribute),
    /// One element of a nested block collection
    Block(&'a SchemaMap),
    /// The `#` / `%` element count of a collection
    Count,
}

impl Lookup<'_> {
    /// Zero value of whatever the path points at
    pub fn zero(&self) -> Value {
        match self {
            Self::Attribute(attr) => Value::zero(attr.value_type),
            Self::Block(_) => Value::Map(BTreeMap::new()),
            Self::Count => Value::Int(0),
        }
    }
}

/// Mapping from attribute name to descriptor
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    attributes: BTreeMap<String, Attribute>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) -> Option<Attribute> {
        self.attributes.insert(name.into(), attribute)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Check every descriptor's invariants, recursing into nested blocks
    pub fn internal_validate(&self) -> Result<()> {
        self.validate_with_prefix("")
    }

    fn validate_with_prefix(&self, prefix: &str) -> Result<()> {
        for (name, attr) in &self.attributes {
            if name.is_empty() || name.contains('.') {
                return Err(Error::invalid_schema(
                    format!("{prefix}{name}"),
                    "attribute names must be non-empty and contain no dots",
                ));
            }
            attr.internal_validate(&format!("{prefix}{name}"), self)?;
        }
        Ok(())
    }

    /// Resolve a flat path (`rules.0.port`, `tags.#`, `labels.env`)
    pub fn lookup(&self, path: &str) -> Option<Lookup<'_>> {
        let parts: Vec<&str> = path.split('.').collect();
        lookup_in_schema(self, &parts)
    }
}

impl<K: Into<String>> FromIterator<(K, Attribute)> for SchemaMap {
    fn from_iter<I: IntoIterator<Item = (K, Attribute)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn lookup_in_schema<'a>(schema: &'a SchemaMap, parts: &[&str]) -> Option<Lookup<'a>> {
    let (name, rest) = parts.split_first()?;
    lookup_in_attribute(schema.get(name)?, rest)
}

fn lookup_in_attribute<'a>(attr: &'a Attribute, parts: &[&str]) -> Option<Lookup<'a>> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(Lookup::Attribute(attr));
    };
    match attr.value_type {
        ValueType::List | ValueType::Set => {
            if *first == "#" {
                return rest.is_empty().then_some(Lookup::Count);
            }
            first.parse::<u64>().ok()?;
            match attr.elem.as_ref()? {
                Elem::Type(elem) => lookup_in_attribute(elem, rest),
                Elem::Block(schema) if rest.is_empty() => Some(Lookup::Block(schema)),
                Elem::Block(schema) => lookup_in_schema(schema, rest),
            }
        }
        // map keys may contain dots, so the rest of the path is the key
        ValueType::Map => {
            if *first == "%" && rest.is_empty() {
                return Some(Lookup::Count);
            }
            attr.elem_attribute().map(Lookup::Attribute)
        }
        _ => None,
    }
}
