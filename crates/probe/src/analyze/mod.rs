//! Analyzer: derive a render verdict from one fetch result
//!
//! The analyzer is a pure function of a [`FetchResult`] and the compiled
//! [`SignatureCatalog`]. It performs no I/O and keeps no state between calls.

pub mod signatures;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ProbeError, ProbeResult};
use crate::fetch::{BrowserCapture, FetchResult, TransportErrorKind};

pub use signatures::{
    ConsoleRule, DomProbe, ElementRole, ElementSignature, ErrorCategory, ErrorSignature,
    ProbeRole, SignatureCatalog,
};

/// Single-value classification of a render attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Success,
    Partial,
    Loaded,
    Unknown,
    ThemeError,
    PropsError,
    ModuleError,
    RenderingError,
    ErrorBoundary,
    FetchFailed,
    NavigationFailed,
    Crashed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Success => "success",
            RenderStatus::Partial => "partial",
            RenderStatus::Loaded => "loaded",
            RenderStatus::Unknown => "unknown",
            RenderStatus::ThemeError => "theme_error",
            RenderStatus::PropsError => "props_error",
            RenderStatus::ModuleError => "module_error",
            RenderStatus::RenderingError => "rendering_error",
            RenderStatus::ErrorBoundary => "error_boundary",
            RenderStatus::FetchFailed => "fetch_failed",
            RenderStatus::NavigationFailed => "navigation_failed",
            RenderStatus::Crashed => "crashed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderStatus::Success)
    }

    /// Whether the verdict came from the transport rather than the content
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RenderStatus::FetchFailed | RenderStatus::NavigationFailed | RenderStatus::Crashed
        )
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified problem found in a fetch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CategorizedError {
    fn new(category: ErrorCategory, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            category,
            message: message.into(),
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Element or probe name → detected
    pub detected_elements: BTreeMap<String, bool>,
    pub errors: Vec<CategorizedError>,
    pub theme_provided: bool,
    pub render_status: RenderStatus,
    /// Console warnings (dynamic mode)
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn errors_in(&self, category: ErrorCategory) -> impl Iterator<Item = &CategorizedError> {
        self.errors.iter().filter(move |e| e.category == category)
    }

    pub fn has_category(&self, category: ErrorCategory) -> bool {
        self.errors_in(category).next().is_some()
    }

    /// Error count per category, categories without errors left out
    pub fn category_counts(&self) -> BTreeMap<ErrorCategory, usize> {
        let mut counts = BTreeMap::new();
        for error in &self.errors {
            *counts.entry(error.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn detected(&self) -> impl Iterator<Item = &str> {
        self.detected_elements
            .iter()
            .filter(|(_, found)| **found)
            .map(|(name, _)| name.as_str())
    }
}

struct CompiledError {
    regex: Regex,
    category: ErrorCategory,
    message: String,
}

struct CompiledElement {
    name: String,
    regex: Regex,
    role: ElementRole,
}

/// Compiled signature catalog
pub struct Analyzer {
    catalog: SignatureCatalog,
    errors: Vec<CompiledError>,
    elements: Vec<CompiledElement>,
    theme: Vec<Regex>,
}

fn compile(pattern: &str) -> ProbeResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ProbeError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Roles seen across element signatures and DOM probes
#[derive(Default)]
struct Detection {
    wrapper: bool,
    framework: bool,
    theme: bool,
    boundary: bool,
}

impl Analyzer {
    /// Compile every pattern in the catalog; an invalid regex is fatal
    pub fn new(catalog: SignatureCatalog) -> ProbeResult<Self> {
        let errors = catalog
            .errors
            .iter()
            .map(|sig| {
                Ok(CompiledError {
                    regex: compile(&sig.pattern)?,
                    category: sig.category,
                    message: sig.message.clone(),
                })
            })
            .collect::<ProbeResult<Vec<_>>>()?;

        let elements = catalog
            .elements
            .iter()
            .map(|sig| {
                Ok(CompiledElement {
                    name: sig.name.clone(),
                    regex: compile(&sig.pattern)?,
                    role: sig.role,
                })
            })
            .collect::<ProbeResult<Vec<_>>>()?;

        let theme = catalog
            .theme
            .iter()
            .map(|p| compile(p))
            .collect::<ProbeResult<Vec<_>>>()?;

        Ok(Self {
            catalog,
            errors,
            elements,
            theme,
        })
    }

    pub fn with_defaults() -> ProbeResult<Self> {
        Self::new(SignatureCatalog::default())
    }

    pub fn catalog(&self) -> &SignatureCatalog {
        &self.catalog
    }

    /// Selectors the dynamic fetcher should count in the page
    pub fn dom_probes(&self) -> &[DomProbe] {
        &self.catalog.dom_probes
    }

    /// Classify one fetch result
    pub fn analyze(&self, fetch: &FetchResult) -> AnalysisResult {
        let content = fetch.content.as_str();
        let text = match &fetch.browser {
            Some(capture) if !capture.body_text.trim().is_empty() => capture.body_text.as_str(),
            _ => content,
        };

        let mut errors = Vec::new();
        for sig in &self.errors {
            if let Some(found) = sig.regex.find(text) {
                errors.push(CategorizedError::new(
                    sig.category,
                    sig.message.clone(),
                    Some(found.as_str().to_string()),
                ));
            }
        }

        for transport in &fetch.errors {
            errors.push(CategorizedError::new(
                ErrorCategory::Network,
                transport.message.clone(),
                Some(transport_label(transport.kind).to_string()),
            ));
        }

        // Console output is reported but never decides the verdict; React dev
        // builds route routine warnings through console.error
        let verdict_errors = errors.len();
        let mut warnings = Vec::new();
        if let Some(capture) = &fetch.browser {
            self.collect_browser_errors(capture, &mut errors, &mut warnings);
        }

        let mut detection = Detection::default();
        let mut detected_elements = BTreeMap::new();
        for element in &self.elements {
            let found = element.regex.is_match(content);
            if found {
                match element.role {
                    ElementRole::Wrapper => detection.wrapper = true,
                    ElementRole::Framework => detection.framework = true,
                    ElementRole::Indicator => {}
                }
            }
            let entry = detected_elements.entry(element.name.clone()).or_insert(false);
            *entry |= found;
        }

        if let Some(capture) = &fetch.browser {
            for probe in &self.catalog.dom_probes {
                let found = capture.dom.get(&probe.name).copied().unwrap_or(0) > 0;
                if found {
                    match probe.role {
                        ProbeRole::Wrapper => detection.wrapper = true,
                        ProbeRole::Framework => detection.framework = true,
                        ProbeRole::Theme => detection.theme = true,
                        ProbeRole::ErrorBoundary => detection.boundary = true,
                        ProbeRole::Indicator => {}
                    }
                }
                let entry = detected_elements.entry(probe.name.clone()).or_insert(false);
                *entry |= found;
            }
        }

        let theme_provided = detection.theme || self.theme.iter().any(|re| re.is_match(content));

        let boundary_marker = self
            .catalog
            .boundary_markers
            .iter()
            .find(|marker| content.contains(marker.as_str()));
        let boundary_hit = boundary_marker.is_some() || detection.boundary;

        let mut render_status = verdict(
            fetch.transport_error_kind(),
            &errors[..verdict_errors],
            &detection,
            content,
        );
        if boundary_hit && !render_status.is_transport() {
            render_status = RenderStatus::ErrorBoundary;
            let detail = match boundary_marker {
                Some(marker) => format!("marker: {}", marker),
                None => "error boundary element in DOM".to_string(),
            };
            errors.push(CategorizedError::new(
                ErrorCategory::Rendering,
                "Error boundary triggered",
                Some(detail),
            ));
        }

        AnalysisResult {
            detected_elements,
            errors,
            theme_provided,
            render_status,
            warnings,
        }
    }

    fn collect_browser_errors(
        &self,
        capture: &BrowserCapture,
        errors: &mut Vec<CategorizedError>,
        warnings: &mut Vec<String>,
    ) {
        for message in &capture.console {
            if message.is_error() {
                if let Some(category) = self.catalog.categorize_console(&message.text) {
                    errors.push(CategorizedError::new(
                        category,
                        message.text.clone(),
                        Some(
                            message
                                .location
                                .clone()
                                .unwrap_or_else(|| "console".to_string()),
                        ),
                    ));
                }
            } else if message.is_warning() {
                warnings.push(message.text.clone());
            }
        }

        for page_error in &capture.page_errors {
            if let Some(category) = self.catalog.categorize_console(page_error) {
                errors.push(CategorizedError::new(
                    category,
                    page_error.clone(),
                    Some("page error".to_string()),
                ));
            }
        }

        for failed in &capture.failed_requests {
            errors.push(CategorizedError::new(
                ErrorCategory::Network,
                format!("{} {}: {}", failed.method, failed.url, failed.error),
                Some("request failed".to_string()),
            ));
        }
    }
}

fn transport_label(kind: TransportErrorKind) -> &'static str {
    match kind {
        TransportErrorKind::Fetch => "fetch",
        TransportErrorKind::Navigation => "navigation",
        TransportErrorKind::Crash => "crash",
    }
}

fn is_html_document(content: &str) -> bool {
    let lowered = content.to_lowercase();
    lowered.contains("<!doctype html") && lowered.contains("<html")
}

fn verdict(
    transport: Option<TransportErrorKind>,
    errors: &[CategorizedError],
    detection: &Detection,
    content: &str,
) -> RenderStatus {
    match transport {
        Some(TransportErrorKind::Crash) => return RenderStatus::Crashed,
        Some(TransportErrorKind::Navigation) => return RenderStatus::NavigationFailed,
        Some(TransportErrorKind::Fetch) => return RenderStatus::FetchFailed,
        None => {}
    }

    let has = |category| errors.iter().any(|e| e.category == category);
    if has(ErrorCategory::Theme) {
        RenderStatus::ThemeError
    } else if has(ErrorCategory::Props) {
        RenderStatus::PropsError
    } else if has(ErrorCategory::Modules) {
        RenderStatus::ModuleError
    } else if has(ErrorCategory::Rendering) {
        RenderStatus::RenderingError
    } else if detection.wrapper {
        RenderStatus::Success
    } else if detection.framework {
        RenderStatus::Partial
    } else if is_html_document(content) {
        RenderStatus::Loaded
    } else {
        RenderStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ConsoleMessage, FailedRequest};
    use pretty_assertions::assert_eq;

    fn analyzer() -> Analyzer {
        Analyzer::with_defaults().unwrap()
    }

    fn page(body: &str) -> FetchResult {
        let content = format!("<!DOCTYPE html><html><body>{}</body></html>", body);
        FetchResult::response("http://localhost:6006/iframe.html", 200, content, 5)
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let fetch = page(r#"<div class="Polaris-Frame">TypeError: x</div>"#);
        let a = analyzer();
        assert_eq!(a.analyze(&fetch), a.analyze(&fetch));
    }

    #[test]
    fn test_wrapper_means_success() {
        let result = analyzer().analyze(&page(r#"<div class="Polaris-Frame"></div>"#));
        assert_eq!(result.render_status, RenderStatus::Success);
        assert_eq!(result.detected_elements.get("frameComponent"), Some(&true));
        assert_eq!(result.detected_elements.get("polarisStyles"), Some(&true));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_theme_beats_rendering() {
        let result = analyzer().analyze(&page(
            "No theme was provided. TypeError: Cannot read properties of undefined",
        ));
        assert_eq!(result.render_status, RenderStatus::ThemeError);
        assert!(result.has_category(ErrorCategory::Rendering));
    }

    #[test]
    fn test_props_beats_modules() {
        let result = analyzer().analyze(&page(
            "PropTypes is not defined; Cannot destructure property 'items'",
        ));
        assert_eq!(result.render_status, RenderStatus::PropsError);
        assert_eq!(result.category_counts().get(&ErrorCategory::Modules), Some(&1));
    }

    #[test]
    fn test_error_boundary_overrides_success() {
        let result = analyzer().analyze(&page(
            r#"<div class="Polaris-Frame"><div>Component Failed to Render</div></div>"#,
        ));
        assert_eq!(result.render_status, RenderStatus::ErrorBoundary);
        let last = result.errors.last().unwrap();
        assert_eq!(last.category, ErrorCategory::Rendering);
        assert_eq!(last.message, "Error boundary triggered");
    }

    #[test]
    fn test_boundary_markers_are_case_sensitive() {
        let result = analyzer().analyze(&page(r#"<div class="Polaris-Frame">component failed to render</div>"#));
        // still caught by the case-insensitive "failed to render" signature
        assert_eq!(result.render_status, RenderStatus::RenderingError);
    }

    #[test]
    fn test_partial_when_only_framework_styles() {
        let result = analyzer().analyze(&page(r#"<span class="Polaris-Text">hi</span>"#));
        assert_eq!(result.render_status, RenderStatus::Partial);
    }

    #[test]
    fn test_loaded_and_unknown() {
        let result = analyzer().analyze(&page("<p>plain</p>"));
        assert_eq!(result.render_status, RenderStatus::Loaded);

        let fragment = FetchResult::response("u", 200, "just text".to_string(), 1);
        assert_eq!(analyzer().analyze(&fragment).render_status, RenderStatus::Unknown);
    }

    #[test]
    fn test_word_frame_outside_class_is_not_success() {
        let result = analyzer().analyze(&page("<p>The frame story</p>"));
        assert_eq!(result.render_status, RenderStatus::Loaded);
    }

    #[test]
    fn test_theme_provided_flag() {
        let result = analyzer().analyze(&page(r#"<div data-polaris-provider="true"></div>"#));
        assert!(result.theme_provided);
        assert!(!analyzer().analyze(&page("<p></p>")).theme_provided);
    }

    #[test]
    fn test_transport_verdicts() {
        let a = analyzer();
        let fetch = FetchResult::transport_failure("u", TransportErrorKind::Fetch, "refused", 1);
        let result = a.analyze(&fetch);
        assert_eq!(result.render_status, RenderStatus::FetchFailed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Network);

        let nav = FetchResult::transport_failure("u", TransportErrorKind::Navigation, "goto", 1);
        assert_eq!(a.analyze(&nav).render_status, RenderStatus::NavigationFailed);

        let crash = FetchResult::transport_failure("u", TransportErrorKind::Crash, "gone", 1);
        assert_eq!(a.analyze(&crash).render_status, RenderStatus::Crashed);
    }

    #[test]
    fn test_transport_verdict_not_overridden_by_boundary() {
        let mut fetch =
            FetchResult::transport_failure("u", TransportErrorKind::Navigation, "goto", 1);
        fetch.content = "Component Failed to Render".to_string();
        let result = analyzer().analyze(&fetch);
        assert_eq!(result.render_status, RenderStatus::NavigationFailed);
    }

    fn dynamic(content: &str, capture: BrowserCapture) -> FetchResult {
        let mut fetch = FetchResult::response("u", 200, content.to_string(), 10);
        fetch.browser = Some(capture);
        fetch
    }

    #[test]
    fn test_dynamic_analyzes_body_text() {
        // iframe shell markup always carries the preview placeholder
        let capture = BrowserCapture {
            body_text: "Dashboard".to_string(),
            dom: BTreeMap::from([("frameComponent".to_string(), 1)]),
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic(
            "<!DOCTYPE html><html><div class=\"sb-nopreview\">No Preview</div></html>",
            capture,
        ));
        assert_eq!(result.render_status, RenderStatus::Success);
        assert_eq!(result.detected_elements.get("frameComponent"), Some(&true));
    }

    #[test]
    fn test_dom_boundary_probe() {
        let capture = BrowserCapture {
            body_text: "Oops".to_string(),
            dom: BTreeMap::from([
                ("frameComponent".to_string(), 1),
                ("hasErrorBoundary".to_string(), 1),
            ]),
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic("<html></html>", capture));
        assert_eq!(result.render_status, RenderStatus::ErrorBoundary);
    }

    #[test]
    fn test_console_errors_and_warnings() {
        let capture = BrowserCapture {
            body_text: "content".to_string(),
            console: vec![
                ConsoleMessage {
                    kind: "error".into(),
                    text: "Warning: Failed prop type: The prop `items` is marked as required".into(),
                    location: None,
                },
                ConsoleMessage {
                    kind: "warning".into(),
                    text: "deprecated API".into(),
                    location: None,
                },
                ConsoleMessage {
                    kind: "error".into(),
                    text: "unrelated noise".into(),
                    location: None,
                },
            ],
            page_errors: vec!["Error: No theme was provided".into()],
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic("<html></html>", capture));
        assert_eq!(result.warnings, vec!["deprecated API".to_string()]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Theme);
        assert_eq!(result.errors[0].detail.as_deref(), Some("page error"));
        // recorded for the report only
        assert_eq!(result.render_status, RenderStatus::Unknown);
    }

    #[test]
    fn test_react_key_warning_does_not_fail_rendered_story() {
        let capture = BrowserCapture {
            body_text: "Dashboard\nOrders".to_string(),
            dom: BTreeMap::from([("frameComponent".to_string(), 1)]),
            console: vec![ConsoleMessage {
                kind: "error".into(),
                text: "Warning: Each child in a list should have a unique \"key\" prop.\n\nCheck the render method of `Frame`.".into(),
                location: None,
            }],
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic("<!DOCTYPE html><html></html>", capture));

        assert_eq!(result.render_status, RenderStatus::Success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Rendering);
        assert_eq!(result.errors[0].detail.as_deref(), Some("console"));
    }

    #[test]
    fn test_polaris_markup_provides_theme_in_dynamic_mode() {
        let capture = BrowserCapture {
            body_text: "Dashboard".to_string(),
            dom: BTreeMap::from([
                ("frameComponent".to_string(), 1),
                ("polarisTheme".to_string(), 3),
            ]),
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic("<html></html>", capture));
        assert!(result.theme_provided);
        assert_eq!(result.detected_elements.get("appProvider"), Some(&false));
    }

    #[test]
    fn test_unable_to_display_is_rendering_error() {
        let result = analyzer().analyze(&page("<p>Unable to display story</p>"));
        assert_eq!(result.render_status, RenderStatus::RenderingError);
        assert_eq!(result.errors[0].message, "Unable to display story");
    }

    #[test]
    fn test_failed_requests_do_not_decide_verdict() {
        let capture = BrowserCapture {
            body_text: "Dashboard".to_string(),
            dom: BTreeMap::from([("frameComponent".to_string(), 1)]),
            failed_requests: vec![FailedRequest {
                url: "http://localhost:6006/favicon.ico".into(),
                method: "GET".into(),
                error: "net::ERR_ABORTED".into(),
            }],
            ..Default::default()
        };
        let result = analyzer().analyze(&dynamic("<html></html>", capture));
        assert_eq!(result.render_status, RenderStatus::Success);
        assert!(result.has_category(ErrorCategory::Network));
    }

    #[test]
    fn test_invalid_pattern_is_fatal() {
        let mut catalog = SignatureCatalog::default();
        catalog.theme.push("(unclosed".to_string());
        assert!(matches!(
            Analyzer::new(catalog),
            Err(ProbeError::Pattern { .. })
        ));
    }
}
