//! Fetchers: retrieve the rendered artifact for one variant
//!
//! Both strategies produce a [`FetchResult`]. Transport failures are part of
//! the result shape (`status == None`, one `fetch` error); an `Err` from
//! [`Fetcher::fetch`] means the fetch machinery itself broke.

pub mod browser;
pub mod http;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::FetchMode;
use crate::error::ProbeResult;

pub use browser::BrowserFetcher;
pub use http::StaticFetcher;

/// What to fetch
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub component: String,
    pub variant: String,
    pub url: String,
    /// 1-based attempt number
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, timeout
    Fetch,
    /// The browser could not navigate to the page
    Navigation,
    /// The browser automation engine failed
    Crash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A console message emitted by page scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ConsoleMessage {
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }

    pub fn is_warning(&self) -> bool {
        self.kind == "warning" || self.kind == "warn"
    }
}

/// A sub-resource the page failed to load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub url: String,
    pub method: String,
    pub error: String,
}

/// Extra observations only a real browser can make
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserCapture {
    #[serde(default)]
    pub console: Vec<ConsoleMessage>,
    #[serde(default)]
    pub page_errors: Vec<String>,
    #[serde(default)]
    pub failed_requests: Vec<FailedRequest>,
    /// DOM probe name → number of matching elements
    #[serde(default)]
    pub dom: BTreeMap<String, u32>,
    /// `document.body.innerText` after the settle delay
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
}

/// One retrieval attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub content: String,
    pub content_length: usize,
    #[serde(default)]
    pub errors: Vec<TransportError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserCapture>,
}

impl FetchResult {
    /// A completed response
    pub fn response(url: impl Into<String>, status: u16, content: String, elapsed_ms: u64) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            status_text: None,
            elapsed_ms,
            content_length: content.len(),
            content,
            errors: Vec::new(),
            browser: None,
        }
    }

    /// A failed attempt: no status, no content, one transport error
    pub fn transport_failure(
        url: impl Into<String>,
        kind: TransportErrorKind,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            url: url.into(),
            status: None,
            status_text: None,
            elapsed_ms,
            content: String::new(),
            content_length: 0,
            errors: vec![TransportError {
                kind,
                message: message.into(),
                code: None,
            }],
            browser: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        if let Some(last) = self.errors.last_mut() {
            last.code = Some(code.into());
        }
        self
    }

    pub fn is_success_status(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    /// The most severe transport error kind, if any
    pub fn transport_error_kind(&self) -> Option<TransportErrorKind> {
        let kinds = || self.errors.iter().map(|e| e.kind);
        if kinds().any(|k| k == TransportErrorKind::Crash) {
            Some(TransportErrorKind::Crash)
        } else if kinds().any(|k| k == TransportErrorKind::Navigation) {
            Some(TransportErrorKind::Navigation)
        } else if kinds().any(|k| k == TransportErrorKind::Fetch) {
            Some(TransportErrorKind::Fetch)
        } else {
            None
        }
    }
}

/// A strategy for retrieving rendered artifacts
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    fn mode(&self) -> FetchMode;

    /// Fetch one variant
    async fn fetch(&self, target: &FetchTarget) -> ProbeResult<FetchResult>;

    /// Release long-lived resources (browser processes)
    async fn shutdown(&self) -> ProbeResult<()> {
        Ok(())
    }
}
