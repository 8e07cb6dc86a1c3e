//! Output formatting for command results

use std::io::IsTerminal;

use comfy_table::{Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use graphscout_graphql::{DataSource, GraphQLResponse, SubgraphManifest};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliResult;

/// Whether stdout output should be colored
pub fn use_color(no_color: bool) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Writes command results to stdout in the selected format
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
}

impl Formatter {
    #[must_use]
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    /// Whether the human format is selected
    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Display any serializable value
    pub fn display<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }

    /// Render a value in the machine formats; human falls back to pretty JSON
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<String> {
        Ok(match self.format {
            OutputFormat::Human | OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Compact => serde_json::to_string(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }

    /// Display a GraphQL response, with errors called out in human mode
    pub fn display_response(&self, response: &GraphQLResponse) -> CliResult<()> {
        if !self.is_human() {
            return self.display(response);
        }

        if let Some(data) = &response.data {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        let messages = response.error_messages();
        if !messages.is_empty() {
            self.print_header("GraphQL errors");
            for message in &messages {
                self.print_bullet(message);
            }
        }
        Ok(())
    }

    /// Display validation results
    pub fn display_validation(&self, messages: &[String]) -> CliResult<()> {
        if !self.is_human() {
            return self.display(messages);
        }

        if messages.is_empty() {
            if self.colored {
                println!("{} {}", "✓".bright_green().bold(), "Query is valid".bright_green());
            } else {
                println!("✓ Query is valid");
            }
            return Ok(());
        }

        self.print_header(&format!("{} validation error(s)", messages.len()));
        for message in messages {
            self.print_bullet(message);
        }
        Ok(())
    }

    /// Display a manifest summary with a data source table
    pub fn display_manifest(&self, cid: &str, manifest: &SubgraphManifest) -> CliResult<()> {
        if !self.is_human() {
            return self.display(manifest);
        }

        self.print_header(&format!("Subgraph {cid}"));
        self.print_kv("Spec version", &manifest.spec_version);
        if let Some(description) = &manifest.description {
            self.print_kv("Description", description);
        }
        if let Some(repository) = &manifest.repository {
            self.print_kv("Repository", repository);
        }
        self.print_kv("Schema", &manifest.schema.file.path);
        self.print_kv("Networks", &manifest.networks().join(", "));

        if !manifest.data_sources.is_empty() {
            println!();
            println!("{}", data_source_table(&manifest.data_sources));
        }
        Ok(())
    }

    /// Print a single value; plain text in human mode
    pub fn display_scalar(&self, label: &str, value: &str) -> CliResult<()> {
        if self.is_human() {
            println!("{value}");
            return Ok(());
        }
        let mut map = serde_json::Map::new();
        map.insert(label.to_string(), serde_json::Value::String(value.to_string()));
        self.display(&map)
    }

    /// Informational line on stderr, kept out of piped output
    pub fn print_info(&self, text: &str) {
        if self.colored {
            eprintln!("{}", text.bright_blue());
        } else {
            eprintln!("{text}");
        }
    }

    pub fn print_header(&self, text: &str) {
        if self.colored {
            println!("\n{}", text.bright_cyan().bold());
            println!("{}", "=".repeat(text.chars().count()).bright_cyan());
        } else {
            println!("\n{text}");
            println!("{}", "=".repeat(text.chars().count()));
        }
    }

    pub fn print_kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("  {}: {}", key.bright_green().bold(), value);
        } else {
            println!("  {key}: {value}");
        }
    }

    fn print_bullet(&self, text: &str) {
        if self.colored {
            println!("  {} {}", "•".bright_red(), text);
        } else {
            println!("  • {text}");
        }
    }
}

fn data_source_table(sources: &[DataSource]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Name", "Kind", "Network", "Address", "Start block"]);

    for source in sources {
        table.add_row(vec![
            source.name.clone(),
            source.kind.clone(),
            source.network.clone().unwrap_or_else(|| "-".to_string()),
            source.source.address.clone().unwrap_or_else(|| "-".to_string()),
            source
                .source
                .start_block
                .map_or_else(|| "-".to_string(), |block| block.to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscout_graphql::manifest::DataSourceSource;
    use serde_json::json;

    #[test]
    fn test_render_formats() {
        let value = json!({ "cid": "QmX" });
        let compact = Formatter::new(OutputFormat::Compact, false);
        assert_eq!(compact.render(&value).unwrap(), r#"{"cid":"QmX"}"#);

        let yaml = Formatter::new(OutputFormat::Yaml, false);
        assert_eq!(yaml.render(&value).unwrap(), "cid: QmX\n");
    }

    #[test]
    fn test_data_source_table_fills_gaps() {
        let table = data_source_table(&[DataSource {
            kind: "ethereum/contract".to_string(),
            name: "Token".to_string(),
            network: None,
            source: DataSourceSource {
                start_block: Some(42),
                ..DataSourceSource::default()
            },
        }]);
        let rendered = table.to_string();
        assert!(rendered.contains("Token"));
        assert!(rendered.contains("42"));
        assert!(rendered.contains('-'));
    }
}
