//! Diff and view rendering

use colored::Colorize;
use schemakit::{AttributeDiff, InstanceDiff, Value, group_by_attribute};
use std::collections::BTreeMap;

const SENSITIVE: &str = "(sensitive)";
const KNOWN_AFTER_APPLY: &str = "(known after apply)";

/// Append `text` as one output line
fn line(out: &mut String, text: String) {
    out.push_str(&text);
    out.push('\n');
}

fn symbol(attr: &AttributeDiff) -> colored::ColoredString {
    if attr.is_removal() {
        "-".red()
    } else if attr.requires_new {
        "±".magenta()
    } else if attr.is_addition() {
        "+".green()
    } else {
        "~".yellow()
    }
}

fn describe(attr: &AttributeDiff) -> String {
    let shown = |s: &str| {
        if attr.sensitive {
            SENSITIVE.to_string()
        } else {
            format!("{s:?}")
        }
    };

    let mut desc = if attr.new_removed {
        format!("{} → (removed)", shown(&attr.old))
    } else if attr.new_computed {
        if attr.old.is_empty() {
            KNOWN_AFTER_APPLY.to_string()
        } else {
            format!("{} → {KNOWN_AFTER_APPLY}", shown(&attr.old))
        }
    } else if attr.old.is_empty() {
        shown(&attr.new)
    } else {
        format!("{} → {}", shown(&attr.old), shown(&attr.new))
    };

    if attr.requires_new {
        desc.push_str(" [forces replacement]");
    }
    desc
}

/// Render a diff as a boxed, grouped table
pub fn render_diff(diff: Option<&InstanceDiff>) -> String {
    let mut out = String::new();

    let Some(diff) = diff.filter(|d| !d.is_empty()) else {
        line(&mut out, format!("  {} No changes", "✓".green()));
        return out;
    };

    line(
        &mut out,
        format!(
            "┌─ {} ─────────────────────────────────────────┐",
            "Resource Diff".bold()
        ),
    );
    out.push_str("│\n");

    if diff.destroy_tainted {
        line(
            &mut out,
            format!(
                "│ {} resource is tainted and will be replaced",
                "!".red().bold()
            ),
        );
        out.push_str("│\n");
    }

    for (root, changes) in group_by_attribute(diff) {
        line(&mut out, format!("│ {}", root.bold()));
        for (key, attr) in changes {
            line(
                &mut out,
                format!(
                    "│   {} {:<30} {}",
                    symbol(attr),
                    key,
                    describe(attr).dimmed()
                ),
            );
        }
        out.push_str("│\n");
    }

    let summary = diff.summary();
    out.push_str("├─────────────────────────────────────────────────────┤\n");
    line(
        &mut out,
        format!(
            "│ Summary: {} changes ({} add, {} change, {} remove, {} computed)",
            summary.total().to_string().bold(),
            summary.additions.to_string().green(),
            summary.modifications.to_string().yellow(),
            summary.removals.to_string().red(),
            summary.computed.to_string().dimmed()
        ),
    );
    if diff.requires_new() {
        let keys = diff.replacement_keys();
        let reason = if keys.is_empty() {
            "tainted".to_string()
        } else {
            keys.join(", ")
        };
        line(
            &mut out,
            format!("│ {} resource must be replaced ({reason})", "⚠".yellow()),
        );
    }
    out.push_str("└─────────────────────────────────────────────────────┘\n");
    out
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Unknown => KNOWN_AFTER_APPLY.to_string(),
        Value::String(s) => format!("{s:?}"),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.type_name().to_string()),
    }
}

/// Render effective top-level values, masking sensitive ones
pub fn render_values(values: &BTreeMap<String, Value>, sensitive: &[&str]) -> String {
    let mut out = String::new();
    for (key, value) in values {
        let shown = if sensitive.contains(&key.as_str()) {
            SENSITIVE.to_string()
        } else if value.contains_unknown() && !value.is_unknown() {
            format!("{} {}", format_value(value), "(partially unknown)".dimmed())
        } else {
            format_value(value)
        };
        line(&mut out, format!("  {:<24} {}", key, shown));
    }
    out
}
