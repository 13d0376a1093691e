//! Loading config and state documents from disk

use anyhow::{Context, Result, bail};
use schemakit::{InstanceState, ResourceConfig};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Document formats accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => bail!(
                "Unsupported file extension '.{other}' for {} (expected .json or .toml)",
                path.display()
            ),
            None => bail!(
                "Cannot tell the format of {} (expected .json or .toml)",
                path.display()
            ),
        }
    }
}

/// Read and deserialize a JSON or TOML document
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;

    match format {
        Format::Json => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display())),
        Format::Toml => {
            toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
        }
    }
}

/// Load the desired configuration of a resource
pub fn load_config(path: &Path) -> Result<ResourceConfig> {
    let config: ResourceConfig = read_document(path)?;
    log::debug!(
        "Loaded {} top-level config values from {}",
        config.raw().len(),
        path.display()
    );
    Ok(config)
}

/// Load prior state, or `None` when no state file is given
pub fn load_state(path: Option<&Path>) -> Result<Option<InstanceState>> {
    let Some(path) = path else {
        log::debug!("No state file, diffing as a new resource");
        return Ok(None);
    };
    let state: InstanceState = read_document(path)?;
    log::debug!(
        "Loaded state for '{}' with {} attributes",
        state.id,
        state.attributes.len()
    );
    Ok(Some(state))
}
