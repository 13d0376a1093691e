//! # schemakit
//!
//! Schema-driven diffing and resource views.
//!
//! Given a typed schema, the prior state of a resource (if any) and its
//! desired configuration, this crate computes what has to change and
//! exposes a merged view of the result to resource logic.
//!
//! ## Core Concepts
//!
//! - **SchemaMap**: attribute name to [`Attribute`] descriptor (type, flags, default, validation)
//! - **ResourceConfig**: untyped desired configuration, made of [`RawValue`]s
//! - **InstanceState**: prior attributes in flat form (`tags.#`, `tags.0`, ...)
//! - **InstanceDiff**: per-path changes computed by [`SchemaMap::diff`]
//! - **ResourceView**: state with a diff applied, built by [`SchemaMap::data`]
//!
//! Values that are not known until apply are [`Value::Unknown`], never an
//! empty or zero value.
//!
//! ## Example
//!
//! ```
//! use schemakit::{Attribute, ResourceConfig, SchemaMap, Value};
//!
//! let schema = SchemaMap::new()
//!     .with("name", Attribute::string().required())
//!     .with("image", Attribute::string().required().force_new())
//!     .with("ip", Attribute::string().computed());
//!
//! let config = ResourceConfig::new()
//!     .with("name", "web")
//!     .with("image", "nginx:1.27");
//!
//! let diff = schema.diff::<()>(None, &config, None, &(), true)?;
//! let view = schema.data(None, diff.as_ref())?;
//!
//! assert_eq!(view.get("name")?, Value::from("web"));
//! assert_eq!(view.get("ip")?, Value::Unknown);
//! # Ok::<(), schemakit::Error>(())
//! ```

pub mod coerce;
pub mod config;
pub mod diff;
pub mod differ;
pub mod error;
pub mod flatmap;
pub mod raw;
pub mod resource_view;
pub mod schema;
pub mod set;
pub mod state;
pub mod testing;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use config::ResourceConfig;
pub use diff::{AttributeDiff, DiffSummary, InstanceDiff, group_by_attribute};
pub use differ::CustomizeDiff;
pub use error::{Error, ErrorCategory, Result};
pub use raw::{RawValue, UNKNOWN_VARIABLE_VALUE};
pub use resource_view::ResourceView;
pub use schema::{
    Attribute, DefaultFn, DefaultValue, DiffSuppressFn, Elem, Lookup, SchemaMap, SetHashFn,
    ValidateFn, ValueType, env_default,
};
pub use set::{Set, hash_value};
pub use state::InstanceState;
pub use testing::view_from_raw;
pub use value::Value;
