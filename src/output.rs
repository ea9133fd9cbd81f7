// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::commands::{CommandOutput, Readable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Markdown table or status line
    Table,
    Json,
    Yaml,
}

pub fn render(output: &CommandOutput, format: OutputFormat) -> Result<String> {
    match output {
        CommandOutput::Status(message) => Ok(message.clone()),
        CommandOutput::Results {
            prefix,
            outputs,
            readable,
        } => match format {
            OutputFormat::Table => Ok(match readable {
                Readable::Table { title, headers } => markdown_table(title, outputs, headers),
                Readable::Text(text) => text.clone(),
            }),
            OutputFormat::Json => serde_json::to_string_pretty(&context_entry(prefix, outputs))
                .context("Failed to encode result as JSON"),
            OutputFormat::Yaml => serde_yaml_ng::to_string(&context_entry(prefix, outputs))
                .context("Failed to encode result as YAML"),
        },
    }
}

/// Outputs keyed by their context prefix, e.g. `{"FortiManager.Device": [...]}`
fn context_entry(prefix: &str, outputs: &Value) -> Value {
    let mut entry = Map::new();
    entry.insert(prefix.to_string(), outputs.clone());
    Value::Object(entry)
}

/// `os_type` -> `Os Type`, `start-ip` -> `Start Ip`
pub fn table_header(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    };
    text.replace('|', "\\|").replace('\n', "<br>")
}

/// Render objects as a markdown table restricted to `headers`.
/// A single object is one row; an empty result prints a placeholder.
pub fn markdown_table(title: &str, data: &Value, headers: &[&str]) -> String {
    let empty = Map::new();
    let rows: Vec<&Map<String, Value>> = match data {
        Value::Array(items) => items.iter().map(|item| item.as_object().unwrap_or(&empty)).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    };

    let mut out = format!("### {title}\n");
    if rows.is_empty() {
        out.push_str("**No entries.**\n");
        return out;
    }

    let titles: Vec<String> = headers.iter().map(|h| table_header(h)).collect();
    out.push_str(&format!("|{}|\n", titles.join("|")));
    out.push_str(&format!("|{}|\n", vec!["---"; headers.len()].join("|")));

    for row in rows {
        let cells: Vec<String> = headers.iter().map(|h| cell(row.get(*h))).collect();
        out.push_str(&format!("|{}|\n", cells.join("|")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_header() {
        assert_eq!(table_header("os_type"), "Os Type");
        assert_eq!(table_header("wildcard-fqdn"), "Wildcard Fqdn");
        assert_eq!(table_header("name"), "Name");
    }

    #[test]
    fn test_markdown_table_rows_and_nulls() {
        let data = json!([
            {"name": "fw1", "ip": "10.0.0.1", "vdom": [{"name": "root"}]},
            {"name": "fw2", "ip": null, "extra": "ignored"}
        ]);
        let table = markdown_table("ADOM adom/root Devices", &data, &["name", "ip"]);

        assert_eq!(
            table,
            "### ADOM adom/root Devices\n|Name|Ip|\n|---|---|\n|fw1|10.0.0.1|\n|fw2||\n"
        );
    }

    #[test]
    fn test_markdown_table_single_object_and_lists() {
        let data = json!({"name": "grp", "member": ["a", "b"]});
        let table = markdown_table("Groups", &data, &["name", "member"]);
        assert!(table.ends_with("|grp|a, b|\n"));
    }

    #[test]
    fn test_markdown_table_empty() {
        assert_eq!(markdown_table("Nothing", &Value::Null, &["name"]), "### Nothing\n**No entries.**\n");
        assert_eq!(markdown_table("Nothing", &json!([]), &["name"]), "### Nothing\n**No entries.**\n");
    }

    #[test]
    fn test_render_formats() {
        let output = CommandOutput::table(
            "FortiManager.Device",
            "Devices",
            &["name"],
            json!([{"name": "fw1"}]),
        );

        let table = render(&output, OutputFormat::Table).unwrap();
        assert!(table.contains("|fw1|"));

        let as_json: Value = serde_json::from_str(&render(&output, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(as_json, json!({"FortiManager.Device": [{"name": "fw1"}]}));

        let yaml = render(&output, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("FortiManager.Device"));

        let status = CommandOutput::Status("Deleted Address web".to_string());
        assert_eq!(render(&status, OutputFormat::Json).unwrap(), "Deleted Address web");
    }
}
