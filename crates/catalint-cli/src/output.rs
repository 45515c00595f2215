//! Output formatting and reporting
//!
//! Human and compact output are printed line by line as results arrive;
//! JSON output is collected and printed as one document at the end.

use crate::OutputFormat;
use catalint_core::{CatalintError, Diagnostic, RunStats, Severity};
use colored::*;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

/// Totals over every checked catalog
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub catalogs: usize,
    pub messages: usize,
    pub skipped: usize,
    pub diagnostics: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn add(&mut self, stats: &RunStats) {
        self.catalogs += 1;
        self.messages += stats.evaluated;
        self.skipped += stats.skipped;
        self.diagnostics += stats.diagnostics;
        self.errors += stats.errors;
        self.elapsed += stats.elapsed;
    }

    pub fn has_issues(&self) -> bool {
        self.diagnostics > 0 || self.errors > 0
    }
}

/// Output formatter for different formats
pub struct OutputFormatter {
    format: OutputFormat,
    diagnostics: Vec<Value>,
    errors: Vec<Value>,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            diagnostics: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn print_diagnostic(&mut self, file: &Path, diagnostic: &Diagnostic) {
        match self.format {
            OutputFormat::Human => println!("{}", human_line(file, diagnostic)),
            OutputFormat::Compact => println!("{}", compact_line(file, diagnostic)),
            OutputFormat::Json => {
                let mut value = json!(diagnostic);
                if let Value::Object(map) = &mut value {
                    map.insert("file".to_string(), json!(file.display().to_string()));
                }
                self.diagnostics.push(value);
            }
        }
    }

    /// Report a message that could not be read or evaluated
    pub fn print_item_error(&mut self, file: &Path, error: &CatalintError) {
        match self.format {
            OutputFormat::Json => self.errors.push(json!({
                "file": file.display().to_string(),
                "kind": format!("{:?}", error.kind()),
                "message": error.to_string(),
            })),
            _ => eprintln!("{} {}: {}", "warning:".yellow().bold(), file.display(), error),
        }
    }

    /// Print whatever belongs after the last diagnostic
    pub fn finish(self, summary: &RunSummary) -> serde_json::Result<()> {
        match self.format {
            OutputFormat::Human => print_summary_human(summary),
            OutputFormat::Compact => {}
            OutputFormat::Json => {
                let result = json!({
                    "diagnostics": self.diagnostics,
                    "errors": self.errors,
                    "summary": {
                        "catalogs": summary.catalogs,
                        "messages": summary.messages,
                        "skipped": summary.skipped,
                        "diagnostics": summary.diagnostics,
                        "errors": summary.errors,
                    }
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Ok(())
    }
}

/// `<file>:<message-id>: [<rule-id>] <hint>`
pub fn compact_line(file: &Path, diagnostic: &Diagnostic) -> String {
    format!(
        "{}:{}: [{}] {}",
        file.display(),
        diagnostic.message_id,
        diagnostic.rule_id,
        diagnostic.hint
    )
}

fn human_line(file: &Path, diagnostic: &Diagnostic) -> String {
    let rule = format!("[{}]", diagnostic.rule_id);
    let rule = match diagnostic.severity {
        Severity::Error => rule.red().bold(),
        Severity::Warning => rule.yellow().bold(),
        Severity::Info => rule.blue().bold(),
        Severity::Hint | Severity::Custom(_) => rule.cyan().bold(),
    };
    format!(
        "{}:{}: {} {}",
        file.display().to_string().bold(),
        diagnostic.message_id,
        rule,
        diagnostic.hint
    )
}

fn print_summary_human(summary: &RunSummary) {
    println!();
    let checked = format!(
        "Checked {} messages in {} catalog(s) in {:.2?}",
        summary.messages, summary.catalogs, summary.elapsed
    );
    if summary.has_issues() {
        println!("{checked}");
        if summary.diagnostics > 0 {
            println!("  Diagnostics: {}", summary.diagnostics.to_string().yellow());
        }
        if summary.errors > 0 {
            println!("  Unreadable or failed messages: {}", summary.errors.to_string().red());
        }
    } else {
        println!("{} {}, no issues found", "✓".green(), checked);
    }
    if summary.skipped > 0 {
        println!("  Skipped (no rules for locale): {}", summary.skipped);
    }
}
