//! Signature catalog: the data the analyzer classifies with
//!
//! Matching rendered markup against strings is fragile. False positives and
//! negatives are expected whenever the UI framework changes its output, so the
//! whole table lives here as data and can be replaced from a TOML file
//! without touching the classification code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ProbeResult;

/// Fixed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Theme,
    Props,
    Modules,
    Rendering,
    Network,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::Theme,
        ErrorCategory::Props,
        ErrorCategory::Modules,
        ErrorCategory::Rendering,
        ErrorCategory::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Theme => "theme",
            ErrorCategory::Props => "props",
            ErrorCategory::Modules => "modules",
            ErrorCategory::Rendering => "rendering",
            ErrorCategory::Network => "network",
        }
    }

    /// Capitalized label for reports
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Theme => "Theme",
            ErrorCategory::Props => "Props",
            ErrorCategory::Modules => "Modules",
            ErrorCategory::Rendering => "Rendering",
            ErrorCategory::Network => "Network",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text pattern that indicates a known failure mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSignature {
    /// Case-insensitive regex
    pub pattern: String,
    pub category: ErrorCategory,
    pub message: String,
}

/// What a detected element says about the render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    /// The component itself rendered
    Wrapper,
    /// The UI framework's styling is present
    Framework,
    /// Reported only
    Indicator,
}

/// A named markup pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSignature {
    pub name: String,
    /// Case-insensitive regex
    pub pattern: String,
    pub role: ElementRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeRole {
    Wrapper,
    Framework,
    Indicator,
    Theme,
    ErrorBoundary,
}

/// A named CSS selector counted in the live DOM (dynamic mode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomProbe {
    pub name: String,
    pub selector: String,
    pub role: ProbeRole,
}

/// Keyword rule for console messages. Matches when every keyword of any one
/// group occurs in the lowercased message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleRule {
    pub category: ErrorCategory,
    pub any_of: Vec<Vec<String>>,
}

impl ConsoleRule {
    pub fn matches(&self, lowercased: &str) -> bool {
        self.any_of
            .iter()
            .any(|group| !group.is_empty() && group.iter().all(|kw| lowercased.contains(kw.as_str())))
    }
}

/// Complete signature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureCatalog {
    /// Ordered error signatures
    pub errors: Vec<ErrorSignature>,
    pub elements: Vec<ElementSignature>,
    /// Case-insensitive regexes that indicate a theme provider
    pub theme: Vec<String>,
    /// Case-sensitive literals left behind by an error boundary
    pub boundary_markers: Vec<String>,
    /// Ordered console rules, first match wins
    pub console: Vec<ConsoleRule>,
    pub dom_probes: Vec<DomProbe>,
}

fn error(pattern: &str, category: ErrorCategory, message: &str) -> ErrorSignature {
    ErrorSignature {
        pattern: pattern.to_string(),
        category,
        message: message.to_string(),
    }
}

fn element(name: &str, pattern: &str, role: ElementRole) -> ElementSignature {
    ElementSignature {
        name: name.to_string(),
        pattern: pattern.to_string(),
        role,
    }
}

fn probe(name: &str, selector: &str, role: ProbeRole) -> DomProbe {
    DomProbe {
        name: name.to_string(),
        selector: selector.to_string(),
        role,
    }
}

fn rule(category: ErrorCategory, groups: &[&[&str]]) -> ConsoleRule {
    ConsoleRule {
        category,
        any_of: groups
            .iter()
            .map(|g| g.iter().map(|kw| kw.to_string()).collect())
            .collect(),
    }
}

impl Default for SignatureCatalog {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            errors: vec![
                error(r"no theme was provided", Theme, "No theme was provided"),
                error(r"cannot destructure property", Props, "Cannot destructure property"),
                error(r"prop-?types? is not defined", Modules, "PropTypes is not defined"),
                error(r"require is not defined", Modules, "require is not defined"),
                error(
                    r"cannot read propert(y|ies) of undefined",
                    Rendering,
                    "Cannot read property of undefined",
                ),
                error(r"no preview", Rendering, "No Preview error"),
                error(r"unable to display", Rendering, "Unable to display story"),
                error(r"element\.type is invalid", Rendering, "Invalid element type"),
                error(r"failed to render", Rendering, "Failed to render"),
                error(r"referenceerror", Rendering, "ReferenceError"),
                error(r"typeerror", Rendering, "TypeError"),
            ],
            elements: vec![
                element("frameComponent", r#"class="[^"]*frame"#, ElementRole::Wrapper),
                element("topBarComponent", r#"class="[^"]*topbar"#, ElementRole::Indicator),
                element("navigationComponent", r#"class="[^"]*navigation"#, ElementRole::Indicator),
                element("breadcrumbsComponent", r#"class="[^"]*breadcrumbs"#, ElementRole::Wrapper),
                element("breadcrumbsAria", r#"aria-label="breadcrumbs""#, ElementRole::Indicator),
                element("polarisProvider", r#"data-polaris-provider="true""#, ElementRole::Indicator),
                element("polarisStyles", r#"class="[^"]*polaris"#, ElementRole::Framework),
            ],
            theme: vec![
                r"appprovider".to_string(),
                r"polaris-provider".to_string(),
                r"data-polaris-provider".to_string(),
                r"__polaris_theme__".to_string(),
                r"colors.*surface".to_string(),
            ],
            boundary_markers: vec![
                "error-boundary".to_string(),
                "border: 2px solid red".to_string(),
                "Component Failed to Render".to_string(),
            ],
            console: vec![
                rule(Theme, &[&["no theme"], &["theme was provided"]]),
                rule(Props, &[&["cannot destructure"], &["property", "undefined"]]),
                rule(Modules, &[&["prop types"], &["prop-types"], &["module"]]),
                rule(Rendering, &[&["render"], &["element"], &["component"]]),
                rule(Network, &[&["network"], &["fetch"], &["load"]]),
            ],
            dom_probes: vec![
                probe(
                    "hasErrorBoundary",
                    r#"[data-testid="error-boundary"], div[style*="border: 2px solid red"], div[style*="border: 3px solid red"]"#,
                    ProbeRole::ErrorBoundary,
                ),
                probe("hasReactError", r#"div[role="alert"], .error-message"#, ProbeRole::Indicator),
                probe(
                    "frameComponent",
                    r#"[data-testid="frame-component"], div[class*="Frame"]"#,
                    ProbeRole::Wrapper,
                ),
                probe(
                    "breadcrumbsComponent",
                    r#"[data-testid="breadcrumbs-component"], nav[aria-label="breadcrumbs"], ol[class*="Breadcrumbs"]"#,
                    ProbeRole::Wrapper,
                ),
                probe("polarisComponents", r#"[class*="Polaris-"]"#, ProbeRole::Framework),
                probe("appProvider", r#"[data-polaris-provider="true"]"#, ProbeRole::Theme),
                probe("polarisTheme", r#"[class*="Polaris"]"#, ProbeRole::Theme),
                probe("hasTopBar", r#"[class*="TopBar"]"#, ProbeRole::Indicator),
                probe("hasNavigation", r#"[class*="Navigation"]"#, ProbeRole::Indicator),
                probe("hasLayout", r#"[class*="Layout"]"#, ProbeRole::Indicator),
                probe("hasPage", r#"[class*="Page"]"#, ProbeRole::Indicator),
                probe(
                    "breadcrumbItems",
                    r#"ol[aria-label="breadcrumbs"] li, nav[aria-label="breadcrumbs"] li"#,
                    ProbeRole::Indicator,
                ),
                probe("hasLinks", "a[href]", ProbeRole::Indicator),
            ],
        }
    }
}

impl SignatureCatalog {
    /// Load a catalog from TOML; sections left out keep their defaults
    pub fn from_toml(content: &str) -> ProbeResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Category of a console message, first matching rule wins
    pub fn categorize_console(&self, message: &str) -> Option<ErrorCategory> {
        let lowered = message.to_lowercase();
        self.console
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.category)
    }
}
