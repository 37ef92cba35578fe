use crate::cli::OutputFormat;
use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

pub fn print_output(format: OutputFormat, value: &Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print!("{}", render_pretty(value, 0)),
    }
    Ok(())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.green().to_string(),
        Value::Number(n) => n.to_string().yellow().to_string(),
        Value::Bool(true) => "true".green().to_string(),
        Value::Bool(false) => "false".red().to_string(),
        Value::Null => "-".dimmed().to_string(),
        other => other.to_string(),
    }
}

fn is_flat(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(|v| !v.is_object() && !v.is_array()),
        Value::Object(_) => false,
        _ => true,
    }
}

/// Key/value lines, nested blocks indented by two spaces. Arrays of
/// scalars stay on one line.
pub fn render_pretty(value: &Value, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    let mut out = String::new();
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let key = key.cyan().bold();
                if is_flat(val) {
                    out.push_str(&format!("{}{}: {}\n", pad, key, inline(val)));
                } else {
                    out.push_str(&format!("{}{}:\n", pad, key));
                    out.push_str(&render_pretty(val, depth + 1));
                }
            }
        }
        Value::Array(items) if !is_flat(value) => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("{}{}\n", pad, format!("[{}]", i).cyan()));
                out.push_str(&render_pretty(item, depth + 1));
            }
        }
        other => out.push_str(&format!("{}{}\n", pad, inline(other))),
    }
    out
}

fn inline(value: &Value) -> String {
    match value {
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(scalar).collect::<Vec<_>>().join(", ")
        ),
        other => scalar(other),
    }
}
