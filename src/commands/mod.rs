pub mod diff;
pub mod show;
pub mod validate;

use anyhow::Result;
use schemakit::{InstanceState, ResourceConfig, SchemaMap};
use std::path::Path;

use crate::cli::InputArgs;
use crate::inputs;
use crate::schema_file;

/// Schema, config and optional prior state read from the command line
pub struct Inputs {
    pub schema: SchemaMap,
    pub config: ResourceConfig,
    pub state: Option<InstanceState>,
}

impl Inputs {
    pub fn load(args: &InputArgs, state: Option<&Path>) -> Result<Self> {
        Ok(Self {
            schema: schema_file::load_schema(&args.schema)?,
            config: inputs::load_config(&args.config)?,
            state: inputs::load_state(state)?,
        })
    }
}
