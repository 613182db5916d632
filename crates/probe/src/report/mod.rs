//! Reporter: JSON artifact, HTML artifact and console summary
//!
//! Everything here only reads a finished [`RunReport`].

pub mod html;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analyze::ErrorCategory;
use crate::error::ProbeResult;
use crate::runner::RunReport;

pub use html::{escape_html, render_html, render_html_in};

/// Errors listed per failed pair in the console summary
const CONSOLE_ERROR_PREVIEW: usize = 2;

/// Follow-up advice for one error category present in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// `None` for the all-clear advice
    pub category: Option<ErrorCategory>,
    pub title: &'static str,
    pub actions: &'static [&'static str],
}

/// Where the artifacts were written
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub html: PathBuf,
}

fn advice(category: ErrorCategory) -> Recommendation {
    match category {
        ErrorCategory::Theme => Recommendation {
            category: Some(category),
            title: "Theme errors detected",
            actions: &[
                "Check that the app provider is configured around the story",
                "Verify the theme object structure is complete",
                "Ensure all required theme colors are provided",
            ],
        },
        ErrorCategory::Props => Recommendation {
            category: Some(category),
            title: "Props destructuring errors",
            actions: &[
                "Check component props are correctly defined",
                "Verify optional props have default values",
                "Ensure the props interface matches component usage",
            ],
        },
        ErrorCategory::Modules => Recommendation {
            category: Some(category),
            title: "Module import errors",
            actions: &[
                "Check PropTypes module imports",
                "Verify all dependencies are installed",
                "Ensure module resolution in the preview build",
            ],
        },
        ErrorCategory::Rendering => Recommendation {
            category: Some(category),
            title: "Rendering errors",
            actions: &[
                "Check component rendering logic",
                "Verify error boundaries wrap the story",
                "Ensure all required dependencies are loaded",
            ],
        },
        ErrorCategory::Network => Recommendation {
            category: Some(category),
            title: "Network errors",
            actions: &[
                "Check the preview server is running at the base URL",
                "Verify story ids match the catalog",
                "Look for failed asset requests in the browser capture",
            ],
        },
    }
}

/// Error count per category over every failed pair
pub fn error_distribution(report: &RunReport) -> BTreeMap<ErrorCategory, usize> {
    let mut counts = BTreeMap::new();
    for failure in &report.summary.failures {
        for error in &failure.errors {
            *counts.entry(error.category).or_insert(0) += 1;
        }
    }
    counts
}

/// One recommendation per category that occurred, or the all-clear
pub fn recommendations(report: &RunReport) -> Vec<Recommendation> {
    let distribution = error_distribution(report);
    let mut advice_list: Vec<Recommendation> = ErrorCategory::ALL
        .into_iter()
        .filter(|c| distribution.contains_key(c))
        .map(advice)
        .collect();

    if report.summary.failed == 0 {
        advice_list.push(Recommendation {
            category: None,
            title: "All components are working correctly",
            actions: &[
                "No immediate fixes required",
                "Consider adding more variants to the catalog",
            ],
        });
    }
    advice_list
}

/// Plain-text run summary for the terminal
pub fn console_summary(report: &RunReport) -> String {
    let summary = &report.summary;
    let rule = "=".repeat(80);
    let mut lines = vec![
        rule.clone(),
        "TEST EXECUTION SUMMARY".to_string(),
        rule.clone(),
        format!("Started:      {}", summary.started_at.to_rfc3339()),
        format!(
            "Completed:    {}",
            summary
                .finished_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("Total Tests:  {}", summary.total),
        format!("Passed:       {}", summary.passed),
        format!("Failed:       {}", summary.failed),
        format!("Success Rate: {}%", summary.success_rate()),
    ];

    if !summary.failures.is_empty() {
        lines.push(String::new());
        lines.push("FAILED COMPONENTS:".to_string());
        for failure in &summary.failures {
            lines.push(format!(
                "  ✗ {} - {} ({})",
                failure.component, failure.variant, failure.render_status
            ));
            for error in failure.errors.iter().take(CONSOLE_ERROR_PREVIEW) {
                lines.push(format!("      • {}: {}", error.category, error.message));
            }
            if failure.errors.len() > CONSOLE_ERROR_PREVIEW {
                lines.push(format!(
                    "      ... and {} more errors",
                    failure.errors.len() - CONSOLE_ERROR_PREVIEW
                ));
            }
        }
    }

    let distribution = error_distribution(report);
    if !distribution.is_empty() {
        lines.push(String::new());
        lines.push("ERROR DISTRIBUTION:".to_string());
        for (category, count) in &distribution {
            lines.push(format!("  • {}: {} occurrences", category, count));
        }
    }

    lines.push(String::new());
    lines.push("RECOMMENDATIONS:".to_string());
    for recommendation in recommendations(report) {
        lines.push(format!("  {}:", recommendation.title));
        for action in recommendation.actions {
            lines.push(format!("      • {}", action));
        }
    }
    lines.push(rule);

    lines.join("\n")
}

fn ensure_parent(path: &Path) -> ProbeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write the report as pretty-printed JSON
pub fn write_json(report: &RunReport, path: &Path) -> ProbeResult<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_json(path: &Path) -> ProbeResult<RunReport> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_html(report: &RunReport, path: &Path) -> ProbeResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, render_html_in(report, path.parent()))?;
    Ok(())
}

/// Write both artifacts
pub fn write_reports(report: &RunReport, json_path: &Path, html_path: &Path) -> ProbeResult<ReportPaths> {
    write_json(report, json_path)?;
    info!("JSON report saved to: {}", json_path.display());
    write_html(report, html_path)?;
    info!("HTML report saved to: {}", html_path.display());

    Ok(ReportPaths {
        json: json_path.to_path_buf(),
        html: html_path.to_path_buf(),
    })
}
