//! Self-contained HTML report

use std::path::Path;

use crate::analyze::ErrorCategory;
use crate::runner::{RunReport, TestOutcome};

/// Messages shown per error category before the remainder line
pub const CATEGORY_PREVIEW: usize = 3;
/// Console warnings shown before the remainder line
pub const WARNING_PREVIEW: usize = 5;

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        .header { background: linear-gradient(135deg, #4b5fc1 0%, #6a4291 100%); color: white; padding: 30px; border-radius: 8px 8px 0 0; }
        .content { padding: 30px; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin: 20px 0; }
        .metric { background: #f8f9fa; padding: 20px; border-radius: 6px; text-align: center; border-left: 4px solid #007bff; }
        .metric.passed { border-left-color: #28a745; }
        .metric.failed { border-left-color: #dc3545; }
        .metric h3 { margin: 0 0 10px 0; font-size: 24px; }
        .metric p { margin: 0; color: #666; }
        .component-section { margin-bottom: 40px; }
        .component-title { font-size: 24px; font-weight: bold; margin-bottom: 20px; color: #333; border-bottom: 2px solid #eee; padding-bottom: 10px; }
        .test-result { border: 1px solid #ddd; border-radius: 6px; margin-bottom: 15px; overflow: hidden; }
        .test-header { padding: 15px 20px; background: #f8f9fa; border-bottom: 1px solid #ddd; display: flex; justify-content: space-between; align-items: center; }
        .test-status { padding: 4px 12px; border-radius: 20px; color: white; font-size: 12px; font-weight: bold; }
        .test-status.passed { background: #28a745; }
        .test-status.failed { background: #dc3545; }
        .test-details { padding: 20px; }
        .metrics-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 10px; margin: 10px 0; }
        .metric-item { background: #f1f3f4; padding: 10px; border-radius: 4px; text-align: center; }
        .metric-value { font-size: 18px; font-weight: bold; color: #333; }
        .metric-label { font-size: 12px; color: #666; }
        .element-badge { display: inline-block; margin: 2px 4px 2px 0; padding: 2px 6px; background: #e3f2fd; color: #1976d2; border-radius: 12px; font-size: 10px; }
        .element-badge.true { background: #e8f5e8; color: #2e7d32; }
        .error-item { background: #fff5f5; border: 1px solid #fed7d7; border-radius: 4px; padding: 10px; margin-bottom: 8px; font-family: monospace; font-size: 12px; }
        .error-categories { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 10px; margin: 10px 0; }
        .error-category { background: #f8f9fa; padding: 10px; border-radius: 4px; font-size: 11px; }
        .error-category h4 { margin: 0 0 5px 0; font-size: 14px; }
        .error-count { background: #dc3545; color: white; padding: 2px 6px; border-radius: 10px; font-size: 11px; }
        .warning-item { color: #8a6d3b; font-size: 11px; }
        .url-link { color: #007bff; text-decoration: none; font-size: 11px; }
        .screenshot-link { display: inline-block; margin: 5px 10px 5px 0; padding: 5px 10px; background: #007bff; color: white; text-decoration: none; border-radius: 4px; font-size: 12px; }
"#;

/// Escape text for element content and quoted attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Show the first `limit` items and a "... and N more" line for the rest
fn preview_list(items: &[&str], limit: usize, class: &str) -> String {
    let mut html = String::new();
    for item in items.iter().take(limit) {
        html.push_str(&format!("<div class=\"{}\">• {}</div>\n", class, escape_html(item)));
    }
    if items.len() > limit {
        html.push_str(&format!(
            "<div class=\"{}\">... and {} more</div>\n",
            class,
            items.len() - limit
        ));
    }
    html
}

/// Components in first-appearance order
fn components(report: &RunReport) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for outcome in &report.outcomes {
        if !seen.contains(&outcome.component.as_str()) {
            seen.push(&outcome.component);
        }
    }
    seen
}

fn metric_item(value: &str, label: &str) -> String {
    format!(
        "<div class=\"metric-item\"><div class=\"metric-value\">{}</div><div class=\"metric-label\">{}</div></div>\n",
        escape_html(value),
        label
    )
}

/// Link target for a screenshot, relative to the report directory when possible
fn screenshot_href(path: &Path, report_dir: Option<&Path>) -> String {
    let relative = report_dir
        .and_then(|dir| path.strip_prefix(dir).ok())
        .unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

fn screenshot_label(path: &Path) -> &'static str {
    let initial = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().ends_with("-initial"))
        .unwrap_or(false);
    if initial {
        "Initial"
    } else {
        "Final"
    }
}

fn render_outcome(outcome: &TestOutcome, report_dir: Option<&Path>) -> String {
    let status = if outcome.passed { "passed" } else { "failed" };
    let analysis = &outcome.analysis;
    let fetch = &outcome.fetch;

    let mut html = String::new();
    html.push_str("<div class=\"test-result\">\n<div class=\"test-header\">\n");
    html.push_str(&format!(
        "<div><strong>{}</strong><br><a href=\"{url}\" class=\"url-link\" target=\"_blank\">{url}</a></div>\n",
        escape_html(&outcome.variant),
        url = escape_html(&outcome.url)
    ));
    html.push_str(&format!(
        "<span class=\"test-status {}\">{}</span>\n</div>\n",
        status,
        status.to_uppercase()
    ));

    html.push_str("<div class=\"test-details\">\n<div class=\"metrics-grid\">\n");
    html.push_str(&metric_item(&format!("{}ms", fetch.elapsed_ms), "Load Time"));
    let http = fetch
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    html.push_str(&metric_item(&http, "HTTP Status"));
    html.push_str(&metric_item(
        if analysis.theme_provided { "✅" } else { "❌" },
        "Theme Provided",
    ));
    html.push_str(&metric_item(analysis.render_status.as_str(), "Render Status"));
    html.push_str(&metric_item(&fetch.content_length.to_string(), "Content Size"));
    html.push_str(&metric_item(&outcome.attempts.to_string(), "Attempts"));
    html.push_str("</div>\n");

    let screenshots = fetch
        .browser
        .as_ref()
        .map(|capture| capture.screenshots.as_slice())
        .unwrap_or_default();
    if !screenshots.is_empty() {
        html.push_str("<div class=\"screenshots\"><strong>Screenshots:</strong>\n");
        for shot in screenshots {
            html.push_str(&format!(
                "<a href=\"{}\" class=\"screenshot-link\" target=\"_blank\">{}</a>\n",
                escape_html(&screenshot_href(shot, report_dir)),
                screenshot_label(shot)
            ));
        }
        html.push_str("</div>\n");
    }

    if !analysis.detected_elements.is_empty() {
        html.push_str("<div class=\"elements-detected\"><strong>Elements Detected:</strong>\n");
        for (name, found) in &analysis.detected_elements {
            html.push_str(&format!(
                "<span class=\"element-badge {}\">{}: {}</span>\n",
                if *found { "true" } else { "" },
                escape_html(name),
                if *found { "✅" } else { "❌" }
            ));
        }
        html.push_str("</div>\n");
    }

    if !fetch.errors.is_empty() {
        html.push_str(&format!("<h4>Transport Errors ({}):</h4>\n", fetch.errors.len()));
        for error in &fetch.errors {
            html.push_str(&format!(
                "<div class=\"error-item\"><strong>{:?}:</strong> {}</div>\n",
                error.kind,
                escape_html(&error.message)
            ));
        }
    }

    let counts = analysis.category_counts();
    if !counts.is_empty() {
        html.push_str("<h4>Error Categories:</h4>\n<div class=\"error-categories\">\n");
        for category in ErrorCategory::ALL {
            let messages: Vec<&str> = analysis
                .errors_in(category)
                .map(|e| e.message.as_str())
                .collect();
            if messages.is_empty() {
                continue;
            }
            html.push_str(&format!(
                "<div class=\"error-category\"><h4>{} <span class=\"error-count\">{}</span></h4>\n",
                category.label(),
                messages.len()
            ));
            html.push_str(&preview_list(&messages, CATEGORY_PREVIEW, "error-message"));
            html.push_str("</div>\n");
        }
        html.push_str("</div>\n");
    }

    if !analysis.warnings.is_empty() {
        html.push_str(&format!(
            "<h4>Console Warnings ({}):</h4>\n",
            analysis.warnings.len()
        ));
        let warnings: Vec<&str> = analysis.warnings.iter().map(String::as_str).collect();
        html.push_str(&preview_list(&warnings, WARNING_PREVIEW, "warning-item"));
    }

    html.push_str("</div>\n</div>\n");
    html
}

/// Render the whole run as one HTML document, screenshot links left as recorded
pub fn render_html(report: &RunReport) -> String {
    render_html_in(report, None)
}

/// Render for a report written into `report_dir`; screenshot links become
/// relative to it
pub fn render_html_in(report: &RunReport, report_dir: Option<&Path>) -> String {
    let summary = &report.summary;
    let generated = summary.finished_at.unwrap_or(summary.started_at);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("<title>Storybook Component Test Report</title>\n");
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str("<div class=\"container\">\n<div class=\"header\">\n");
    html.push_str("<h1>Storybook Component Test Report</h1>\n");
    html.push_str(&format!(
        "<p>Generated on {}</p>\n</div>\n",
        generated.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    html.push_str("<div class=\"content\">\n<div class=\"summary\">\n");
    html.push_str(&format!(
        "<div class=\"metric\"><h3>{}</h3><p>Total Tests</p></div>\n",
        summary.total
    ));
    html.push_str(&format!(
        "<div class=\"metric passed\"><h3>{}</h3><p>Passed</p></div>\n",
        summary.passed
    ));
    html.push_str(&format!(
        "<div class=\"metric failed\"><h3>{}</h3><p>Failed</p></div>\n",
        summary.failed
    ));
    html.push_str(&format!(
        "<div class=\"metric\"><h3>{}%</h3><p>Success Rate</p></div>\n</div>\n",
        summary.success_rate()
    ));

    for component in components(report) {
        html.push_str(&format!(
            "<div class=\"component-section\">\n<h2 class=\"component-title\">{}</h2>\n",
            escape_html(component)
        ));
        for outcome in report.outcomes.iter().filter(|o| o.component == component) {
            html.push_str(&render_outcome(outcome, report_dir));
        }
        html.push_str("</div>\n");
    }

    html.push_str("</div>\n</div>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{AnalysisResult, CategorizedError, RenderStatus};
    use crate::fetch::{BrowserCapture, FetchResult};
    use crate::runner::RunSummary;
    use std::path::PathBuf;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn outcome(component: &str, errors: Vec<CategorizedError>, warnings: Vec<String>) -> TestOutcome {
        TestOutcome {
            component: component.to_string(),
            variant: "default".to_string(),
            url: "http://localhost:6006/iframe.html?id=x&args=&viewMode=story".to_string(),
            fetch: FetchResult::response("u", 200, "<html></html>".to_string(), 42),
            analysis: AnalysisResult {
                detected_elements: BTreeMap::from([("frameComponent".to_string(), false)]),
                errors,
                theme_provided: false,
                render_status: RenderStatus::RenderingError,
                warnings,
            },
            attempts: 1,
            passed: false,
        }
    }

    fn report(outcomes: Vec<TestOutcome>) -> RunReport {
        let mut summary = RunSummary::new(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        for o in &outcomes {
            summary.record(o);
        }
        summary.finish(Utc.with_ymd_and_hms(2026, 1, 2, 3, 5, 0).unwrap());
        RunReport { summary, outcomes }
    }

    fn rendering(message: &str) -> CategorizedError {
        CategorizedError {
            category: ErrorCategory::Rendering,
            message: message.to_string(),
            detail: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_category_truncation() {
        let errors = (1..=5).map(|i| rendering(&format!("failure {}", i))).collect();
        let html = render_html(&report(vec![outcome("frame", errors, vec![])]));

        assert!(html.contains("failure 3"));
        assert!(!html.contains("failure 4"));
        assert!(html.contains("... and 2 more"));
        assert!(html.contains("<span class=\"error-count\">5</span>"));
    }

    #[test]
    fn test_warning_truncation() {
        let warnings = (1..=7).map(|i| format!("warn {}", i)).collect();
        let html = render_html(&report(vec![outcome("frame", vec![], warnings)]));
        assert!(html.contains("warn 5"));
        assert!(!html.contains("warn 6"));
        assert!(html.contains("... and 2 more"));
    }

    #[test]
    fn test_content_is_escaped() {
        let html = render_html(&report(vec![outcome(
            "<b>frame</b>",
            vec![rendering("<img src=x onerror=alert(1)>")],
            vec![],
        )]));
        assert!(!html.contains("<img src=x"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;b&gt;frame&lt;/b&gt;"));
    }

    #[test]
    fn test_generated_timestamp_is_run_end() {
        let html = render_html(&report(vec![]));
        assert!(html.contains("Generated on 2026-01-02 03:05:00 UTC"));
        assert!(html.contains("<h3>0%</h3>"));
    }

    #[test]
    fn test_screenshot_links_relative_to_report_dir() {
        let mut o = outcome("frame", vec![], vec![]);
        o.fetch.browser = Some(BrowserCapture {
            screenshots: vec![
                PathBuf::from("out/screenshots/screenshot-frame-default-initial.png"),
                PathBuf::from("out/screenshots/screenshot-frame-default-final-1.png"),
            ],
            ..Default::default()
        });
        let html = render_html_in(&report(vec![o]), Some(Path::new("out")));

        assert!(html.contains(
            r#"<a href="screenshots/screenshot-frame-default-initial.png" class="screenshot-link" target="_blank">Initial</a>"#
        ));
        assert!(html.contains(
            r#"<a href="screenshots/screenshot-frame-default-final-1.png" class="screenshot-link" target="_blank">Final</a>"#
        ));
    }

    #[test]
    fn test_no_screenshot_section_in_static_mode() {
        let html = render_html(&report(vec![outcome("frame", vec![], vec![])]));
        assert!(!html.contains("class=\"screenshot-link\""));
    }

    #[test]
    fn test_rendering_is_stable() {
        let r = report(vec![outcome("frame", vec![rendering("boom")], vec![])]);
        assert_eq!(render_html(&r), render_html(&r));
    }
}
