//! Static fetch: one HTTP GET, no script execution

use std::time::{Duration, Instant};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::debug;

use super::{FetchResult, FetchTarget, Fetcher, TransportErrorKind};
use crate::config::FetchMode;
use crate::error::ProbeResult;

pub(crate) const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub(crate) const ACCEPT_LANGUAGE_EN: &str = "en-US,en;q=0.9";

/// Fetches the raw markup the preview server returns
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(timeout: Duration) -> ProbeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_EN));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    fn mode(&self) -> FetchMode {
        FetchMode::Static
    }

    async fn fetch(&self, target: &FetchTarget) -> ProbeResult<FetchResult> {
        let start = Instant::now();
        debug!("GET {}", target.url);

        let response = match self.client.get(&target.url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(transport_failure(&target.url, e, start)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Ok(transport_failure(&target.url, e, start)),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut result = FetchResult::response(&target.url, status.as_u16(), body, elapsed_ms);
        result.status_text = status.canonical_reason().map(String::from);

        debug!(
            "{} -> HTTP {} ({} bytes, {} ms)",
            target.url, status, result.content_length, elapsed_ms
        );
        Ok(result)
    }
}

fn transport_failure(url: &str, error: reqwest::Error, start: Instant) -> FetchResult {
    let code = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_body() || error.is_decode() {
        "body"
    } else {
        "request"
    };
    FetchResult::transport_failure(
        url,
        TransportErrorKind::Fetch,
        error.to_string(),
        start.elapsed().as_millis() as u64,
    )
    .with_code(code)
}
