//! Output formatting for rackflash (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        }
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Whether human-oriented chatter (progress, prompts) should be shown
    pub fn interactive(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Table
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if self.interactive() {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if self.interactive() {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print a serializable summary; key-value lines in table mode
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Variant display for variants command
#[derive(Debug, Tabled, Serialize)]
pub struct VariantRow {
    #[tabled(rename = "Variant")]
    pub variant: String,
    #[tabled(rename = "Part")]
    pub part_number: String,
    #[tabled(rename = "Image size")]
    pub image_len: String,
    #[tabled(rename = "Patches")]
    pub patches: usize,
    #[tabled(rename = "Checksum regions")]
    pub regions: usize,
    #[tabled(rename = "Flash segments")]
    pub segments: usize,
}

/// Segment display for the flash plan
#[derive(Debug, Tabled, Serialize)]
pub struct SegmentRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Start")]
    pub start: String,
    #[tabled(rename = "End")]
    pub end: String,
    #[tabled(rename = "Bytes")]
    pub len: usize,
}
