//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use storyprobe::runner::{RunReport, TestOutcome};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// Full run report as JSON
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One line of the results table
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeRow {
    pub component: String,
    pub variant: String,
    pub result: &'static str,
    pub verdict: String,
    pub http: String,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub errors: usize,
}

impl From<&TestOutcome> for OutcomeRow {
    fn from(outcome: &TestOutcome) -> Self {
        Self {
            component: outcome.component.clone(),
            variant: outcome.variant.clone(),
            result: if outcome.passed { "✓ pass" } else { "✗ fail" },
            verdict: outcome.analysis.render_status.to_string(),
            http: outcome
                .fetch
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            attempts: outcome.attempts,
            elapsed_ms: outcome.fetch.elapsed_ms,
            errors: outcome.analysis.errors.len(),
        }
    }
}

impl TableDisplay for OutcomeRow {
    fn headers() -> Vec<&'static str> {
        vec!["Component", "Variant", "Result", "Verdict", "HTTP", "Attempts", "Time", "Errors"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.component.clone(),
            self.variant.clone(),
            self.result.to_string(),
            self.verdict.clone(),
            self.http.clone(),
            self.attempts.to_string(),
            format!("{} ms", self.elapsed_ms),
            self.errors.to_string(),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No variants tested.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print the outcome of a run in the requested format
pub fn print_report(report: &RunReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        return;
    }

    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
    print_list(&rows, format);
    println!();
    println!("{}", storyprobe::report::console_summary(report));

    let summary = &report.summary;
    let line = format!(
        "{}/{} variants passed ({}%)",
        summary.passed,
        summary.total,
        summary.success_rate()
    );
    if summary.failed == 0 {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
