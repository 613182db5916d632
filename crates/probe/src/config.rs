//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProbeError, ProbeResult};

/// Preview server the harness talks to when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:6006";

/// Story id prefix used when building variant URLs
pub const DEFAULT_STORY_SCOPE: &str = "components-navigation";

/// How a variant's rendered artifact is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP GET, body captured verbatim
    #[default]
    Static,
    /// Real browser engine driven through Playwright
    Dynamic,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Static => "static",
            FetchMode::Dynamic => "dynamic",
        }
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Origin of the preview server
    pub base_url: String,

    /// Story id prefix (`<scope>-<component>--<variant>`)
    pub story_scope: String,

    /// Fetch strategy
    pub mode: FetchMode,

    /// Hard bound for one fetch attempt
    pub timeout_ms: u64,

    /// Maximum number of attempts per variant
    pub max_retries: u32,

    /// Delay between attempts
    pub retry_delay_ms: u64,

    /// Apply the retry policy in static mode too
    pub retry_static: bool,

    /// Exit non-zero when any variant fails
    pub fail_on_error: bool,

    /// Optional YAML variant catalog (built-in catalog otherwise)
    pub catalog_path: Option<PathBuf>,

    /// Optional TOML signature catalog (built-in signatures otherwise)
    pub signatures_path: Option<PathBuf>,

    /// Browser settings for dynamic mode
    pub browser: BrowserConfig,

    /// Report artifact locations
    pub report: ReportConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            story_scope: DEFAULT_STORY_SCOPE.to_string(),
            mode: FetchMode::Static,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            retry_static: false,
            fail_on_error: false,
            catalog_path: None,
            signatures_path: None,
            browser: BrowserConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Dynamic-mode browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Node.js executable used to run the Playwright driver
    pub node_binary: PathBuf,

    /// Directory Playwright is resolved from (where `node_modules` lives)
    pub project_dir: PathBuf,

    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Fixed wait after the network goes idle
    pub settle_ms: u64,

    /// Write PNG screenshots per variant/attempt
    pub screenshots: bool,

    /// Screenshot directory, relative to the report output directory
    pub screenshot_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
            headless: true,
            viewport_width: 1200,
            viewport_height: 800,
            settle_ms: 3_000,
            screenshots: true,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

/// Where reports are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub json_file: String,
    pub html_file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            json_file: "storybook-test-report.json".to_string(),
            html_file: "storybook-test-report.html".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> ProbeResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the harness cannot run with
    pub fn validate(&self) -> ProbeResult<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ProbeError::InvalidConfig(format!("base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ProbeError::InvalidConfig(format!(
                "base_url '{}' is not an HTTP(S) origin",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ProbeError::InvalidConfig("timeout_ms must be positive".into()));
        }
        if self.max_retries == 0 {
            return Err(ProbeError::InvalidConfig("max_retries must be at least 1".into()));
        }
        if self.story_scope.trim().is_empty() {
            return Err(ProbeError::InvalidConfig("story_scope must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Absolute screenshot directory
    pub fn screenshot_dir(&self) -> PathBuf {
        self.report.output_dir.join(&self.browser.screenshot_dir)
    }

    pub fn json_report_path(&self) -> PathBuf {
        self.report.output_dir.join(&self.report.json_file)
    }

    pub fn html_report_path(&self) -> PathBuf {
        self.report.output_dir.join(&self.report.html_file)
    }
}
