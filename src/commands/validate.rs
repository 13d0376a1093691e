use anyhow::{Result, bail};
use schemakit::Error;

use crate::Context;
use crate::cli::InputArgs;
use crate::commands::Inputs;
use crate::ui;

/// Every problem the schema finds in the config
pub fn check(args: &InputArgs) -> Result<Vec<Error>> {
    let inputs = Inputs::load(args, None)?;
    Ok(inputs.schema.validate(&inputs.config))
}

pub fn run(ctx: &Context, args: InputArgs) -> Result<()> {
    let errors = check(&args)?;

    if errors.is_empty() {
        if !ctx.quiet {
            ui::success(&format!("{} is valid", args.config.display()));
        }
        return Ok(());
    }

    for err in &errors {
        ui::error(&format!("[{}] {err}", err.category()));
        if ctx.verbose > 0 {
            ui::dim(err.category().description());
        }
    }
    bail!(
        "{} failed validation with {} error(s)",
        args.config.display(),
        errors.len()
    )
}
