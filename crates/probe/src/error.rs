//! Error types for the verification harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Invalid signature pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Playwright not found. Install with: npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Browser driver exited unexpectedly")]
    DriverExited,

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
