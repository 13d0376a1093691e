use anyhow::{Context as _, Result};
use schemakit::{InstanceState, Value};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::ShowArgs;
use crate::commands::Inputs;
use crate::display;
use crate::ui;

/// What `show` reports about the materialized view
#[derive(Debug, Serialize)]
pub struct ViewReport {
    pub id: String,
    pub new_resource: bool,
    pub requires_new: bool,
    pub values: BTreeMap<String, Value>,
    /// State the view would persist, once it has an id
    pub state: Option<InstanceState>,
    #[serde(skip)]
    pub sensitive: Vec<String>,
}

/// Diff the inputs, apply the diff and collect the resulting view
pub fn compute(args: &ShowArgs) -> Result<ViewReport> {
    let inputs = Inputs::load(&args.input, args.state.as_deref())?;
    let schema = &inputs.schema;

    let diff = schema
        .diff::<()>(inputs.state.as_ref(), &inputs.config, None, &(), true)
        .context("Failed to compute diff")?;
    let mut view = schema
        .data(inputs.state.as_ref(), diff.as_ref())
        .context("Failed to apply diff")?;

    if let Some(id) = &args.id {
        log::debug!("Assigning id '{id}' to the view");
        view.set_id(id.clone());
    }

    Ok(ViewReport {
        id: view.id().to_string(),
        new_resource: view.is_new_resource(),
        requires_new: diff.as_ref().is_some_and(|d| d.requires_new()),
        values: view.values()?,
        state: view.state()?,
        sensitive: schema
            .iter()
            .filter(|(_, attr)| attr.sensitive)
            .map(|(name, _)| name.to_string())
            .collect(),
    })
}

pub fn run(ctx: &Context, args: ShowArgs) -> Result<()> {
    let report = compute(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Resource View");
        ui::kv(
            "Id",
            if report.id.is_empty() {
                "(not assigned)"
            } else {
                report.id.as_str()
            },
        );
        if report.requires_new {
            ui::warn("Changes force replacement of the resource");
        } else if report.new_resource {
            ui::dim("New resource");
        }
    }

    ui::section("Values");
    let sensitive: Vec<&str> = report.sensitive.iter().map(String::as_str).collect();
    print!("{}", display::render_values(&report.values, &sensitive));

    if let Some(state) = &report.state {
        ui::section("Resulting State");
        for (key, value) in &state.attributes {
            let root = key.split('.').next().unwrap_or(key);
            let shown = if sensitive.contains(&root) {
                "(sensitive)".to_string()
            } else {
                ui::truncate(value, 60)
            };
            ui::kv(key, &shown);
        }
    }
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
        id: Option<&str>,
    ) -> ShowArgs {
        ShowArgs {
            input: input_args(schema, config),
            state: state.map(|s| s.path().to_path_buf()),
            id: id.map(ToString::to_string),
            json: false,
        }
    }

    #[test]
    fn test_show_new_resource() {
        let schema = file(".toml", SCHEMA);
        let config = file(
            ".json",
            r#"{"name": "web", "image": "nginx:1", "password": "s3cret", "tags": ["a", "b"]}"#,
        );

        let report = compute(&args(&schema, &config, None, None)).unwrap();
        assert!(report.id.is_empty());
        assert!(report.state.is_none());
        assert_eq!(report.values["name"], Value::from("web"));
        assert_eq!(report.values["ip"], Value::Unknown);
        assert_eq!(report.sensitive, vec!["password".to_string()]);
    }

    #[test]
    fn test_show_with_id_produces_state() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"name": "web", "image": "nginx:1"}"#);

        let report = compute(&args(&schema, &config, None, Some("i-42"))).unwrap();
        let state = report.state.unwrap();
        assert_eq!(state.id, "i-42");
        assert_eq!(state.get("name"), Some("web"));
        assert_eq!(state.get("id"), Some("i-42"));
        assert!(state.get("ip").is_none());
    }

    #[test]
    fn test_show_replacement_clears_id() {
        let schema = file(".toml", SCHEMA);
        let config = file(".json", r#"{"name": "web", "image": "nginx:2"}"#);
        let state = file(
            ".toml",
            r#"
id = "i-1"

[attributes]
name = "web"
image = "nginx:1"
ip = "10.0.0.1"
"#,
        );

        let report = compute(&args(&schema, &config, Some(&state), None)).unwrap();
        assert!(report.requires_new);
        assert!(report.id.is_empty());
        assert_eq!(report.values["image"], Value::from("nginx:2"));
    }
}
