use anyhow::{Context as _, Result};
use schemakit::InstanceDiff;

use crate::Context;
use crate::cli::DiffArgs;
use crate::commands::Inputs;
use crate::display;
use crate::ui;

/// Load inputs and compute the diff
pub fn compute(args: &DiffArgs) -> Result<Option<InstanceDiff>> {
    let inputs = Inputs::load(&args.input, args.state.as_deref())?;
    let diff = inputs
        .schema
        .diff::<()>(inputs.state.as_ref(), &inputs.config, None, &(), true)
        .context("Failed to compute diff")?;
    Ok(diff)
}

pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let diff = compute(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Diff");
        if let Some(path) = &args.state {
            ui::kv("State", &path.display().to_string());
        } else {
            ui::kv("State", "(none, new resource)");
        }
        println!();
    }
    print!("{}", display::render_diff(diff.as_ref()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{SCHEMA, file, input_args};

    fn args(
        schema: &tempfile::NamedTempFile,
        config: &tempfile::NamedTempFile,
        state: Option<&tempfile::NamedTempFile>,
    ) -> DiffArgs {
        DiffArgs {
            input: input_args(schema, config),
            state: state.map(|s| s.path().to_path_buf()),
            json: false,
        }
    }

    #[test]
    fn test_compute_creation() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"name": "web", "image": "nginx:1"}"#);

        let diff = compute(&args(&schema, &config, None)).unwrap().unwrap();
        assert_eq!(diff.get("name").unwrap().new, "web");
        assert!(diff.get("ip").unwrap().new_computed);
        assert!(diff.get("image").unwrap().requires_new);
    }

    #[test]
    fn test_compute_update_with_state() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"name": "api", "image": "nginx:1"}"#);
        let state = file(
            ".json",
            r#"{"id": "i-1", "attributes": {"id": "i-1", "name": "web", "image": "nginx:1", "ip": "10.0.0.1"}}"#,
        );

        let diff = compute(&args(&schema, &config, Some(&state)))
            .unwrap()
            .unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("name").unwrap().old, "web");
        assert!(!diff.requires_new());
    }

    #[test]
    fn test_compute_no_changes() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"name": "web", "image": "nginx:1"}"#);
        let state = file(
            ".json",
            r#"{"id": "i-1", "attributes": {"name": "web", "image": "nginx:1", "ip": "10.0.0.1"}}"#,
        );
        assert!(compute(&args(&schema, &config, Some(&state))).unwrap().is_none());
    }

    #[test]
    fn test_compute_reports_config_errors() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"image": "nginx:1"}"#);
        let err = compute(&args(&schema, &config, None)).unwrap_err();
        assert!(format!("{err:#}").contains("name"));
    }
}
