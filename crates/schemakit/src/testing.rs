//! Helpers for building views without a provider

use crate::config::ResourceConfig;
use crate::error::Result;
use crate::resource_view::ResourceView;
use crate::schema::SchemaMap;

/// Build a fully materialized view straight from raw configuration
///
/// Runs a creation diff (no prior state, no customization) and
/// materializes it. Useful for exercising resource logic in tests.
pub fn view_from_raw(
    schema: &SchemaMap,
    raw: impl Into<ResourceConfig>,
) -> Result<ResourceView<'_>> {
    let config = raw.into();
    let diff = schema.diff::<()>(None, &config, None, &(), true)?;
    schema.data(None, diff.as_ref())
}
