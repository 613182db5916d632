//! Orchestrator: fetch, analyze and record every catalog entry in order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::analyze::{AnalysisResult, Analyzer, CategorizedError, RenderStatus};
use crate::catalog::{story_url, VariantCatalog};
use crate::config::{FetchMode, ProbeConfig};
use crate::fetch::{FetchResult, FetchTarget, Fetcher, TransportErrorKind};
use crate::retry::{retry, RetryPolicy};

/// Final record for one (component, variant) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub component: String,
    pub variant: String,
    pub url: String,
    /// Last attempt's fetch
    pub fetch: FetchResult,
    pub analysis: AnalysisResult,
    pub attempts: u32,
    pub passed: bool,
}

/// A failed pair as listed in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub component: String,
    pub variant: String,
    pub render_status: RenderStatus,
    pub errors: Vec<CategorizedError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
            started_at,
            finished_at: None,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &TestOutcome) {
        self.total += 1;
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
            self.failures.push(FailureEntry {
                component: outcome.component.clone(),
                variant: outcome.variant.clone(),
                render_status: outcome.analysis.render_status,
                errors: outcome.analysis.errors.clone(),
            });
        }
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
    }

    /// Percentage of passed variants, rounded; 0 for an empty run
    pub fn success_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.passed as f64 / self.total as f64 * 100.0).round() as u32
    }
}

/// Everything a run produced, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub outcomes: Vec<TestOutcome>,
}

/// Pass condition: HTTP 200 and a `success` verdict
pub fn is_pass(fetch: &FetchResult, analysis: &AnalysisResult) -> bool {
    fetch.status == Some(200) && analysis.render_status.is_success()
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub story_scope: String,
    pub retry: RetryPolicy,
}

impl RunnerConfig {
    /// Dynamic mode always retries; static mode only with `retry_static`
    pub fn from_probe_config(config: &ProbeConfig) -> Self {
        let retry = match (config.mode, config.retry_static) {
            (FetchMode::Dynamic, _) | (FetchMode::Static, true) => {
                RetryPolicy::new(config.max_retries, config.retry_delay())
            }
            (FetchMode::Static, false) => RetryPolicy::once(),
        };
        Self {
            base_url: config.base_url.clone(),
            story_scope: config.story_scope.clone(),
            retry,
        }
    }
}

/// Runs the catalog through one fetcher and the analyzer
pub struct ProbeRunner {
    fetcher: Box<dyn Fetcher>,
    analyzer: Analyzer,
    config: RunnerConfig,
}

impl ProbeRunner {
    pub fn new(fetcher: Box<dyn Fetcher>, analyzer: Analyzer, config: RunnerConfig) -> Self {
        Self {
            fetcher,
            analyzer,
            config,
        }
    }

    /// Process every pair; a failing variant never stops the run
    pub async fn run(&self, catalog: &VariantCatalog) -> RunReport {
        let mut summary = RunSummary::new(Utc::now());
        let mut outcomes = Vec::with_capacity(catalog.len());

        info!(
            "Testing {} variant(s) against {} ({} fetch)",
            catalog.len(),
            self.config.base_url,
            self.fetcher.mode().as_str()
        );

        for entry in catalog.entries() {
            let outcome = self.run_variant(entry.component, entry.variant).await;
            summary.record(&outcome);
            outcomes.push(outcome);
        }

        if let Err(e) = self.fetcher.shutdown().await {
            warn!("Failed to shut down fetcher: {}", e);
        }

        summary.finish(Utc::now());
        info!(
            "Results: {} passed, {} failed ({}%)",
            summary.passed,
            summary.failed,
            summary.success_rate()
        );

        RunReport { summary, outcomes }
    }

    async fn run_variant(&self, component: &str, variant: &str) -> TestOutcome {
        let url = story_url(&self.config.base_url, &self.config.story_scope, component, variant);
        let url_ref = url.as_str();
        debug!("Testing {}/{}: {}", component, variant, url);

        let retried = retry(
            self.config.retry,
            move |attempt| self.attempt(component, variant, url_ref, attempt),
            |result: &(FetchResult, AnalysisResult)| is_pass(&result.0, &result.1),
        )
        .await;

        let (fetch, analysis) = retried.value;
        let passed = is_pass(&fetch, &analysis);

        if passed {
            info!("✓ {}/{} ({} ms)", component, variant, fetch.elapsed_ms);
        } else {
            let first = analysis
                .errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("no errors recorded");
            error!(
                "✗ {}/{} - {} after {} attempt(s): {}",
                component, variant, analysis.render_status, retried.attempts, first
            );
        }

        TestOutcome {
            component: component.to_string(),
            variant: variant.to_string(),
            url,
            fetch,
            analysis,
            attempts: retried.attempts,
            passed,
        }
    }

    async fn attempt(
        &self,
        component: &str,
        variant: &str,
        url: &str,
        attempt: u32,
    ) -> (FetchResult, AnalysisResult) {
        let target = FetchTarget {
            component: component.to_string(),
            variant: variant.to_string(),
            url: url.to_string(),
            attempt,
        };

        let start = Instant::now();
        let fetch = match self.fetcher.fetch(&target).await {
            Ok(fetch) => fetch,
            Err(e) => {
                error!("Fetcher failed for {}/{}: {}", component, variant, e);
                FetchResult::transport_failure(
                    url,
                    TransportErrorKind::Crash,
                    e.to_string(),
                    start.elapsed().as_millis() as u64,
                )
            }
        };

        let analysis = self.analyzer.analyze(&fetch);
        (fetch, analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchMode;
    use crate::error::{ProbeError, ProbeResult};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves canned pages keyed by a substring of the URL
    struct ScriptedFetcher {
        pages: Vec<(&'static str, u16, &'static str)>,
        calls: Arc<AtomicU32>,
        broken: bool,
    }

    #[async_trait::async_trait]
    impl Fetcher for ScriptedFetcher {
        fn mode(&self) -> FetchMode {
            FetchMode::Static
        }

        async fn fetch(&self, target: &FetchTarget) -> ProbeResult<FetchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(ProbeError::DriverExited);
            }
            let (status, body) = self
                .pages
                .iter()
                .find(|(key, _, _)| target.url.contains(key))
                .map(|(_, status, body)| (*status, *body))
                .unwrap_or((404, "not found"));
            Ok(FetchResult::response(&target.url, status, body.to_string(), 3))
        }
    }

    fn runner(
        pages: Vec<(&'static str, u16, &'static str)>,
        retry: RetryPolicy,
        broken: bool,
    ) -> (ProbeRunner, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = ScriptedFetcher {
            pages,
            calls: calls.clone(),
            broken,
        };
        let config = RunnerConfig {
            base_url: "http://localhost:6006".to_string(),
            story_scope: "components-navigation".to_string(),
            retry,
        };
        let analyzer = Analyzer::with_defaults().unwrap();
        (ProbeRunner::new(Box::new(fetcher), analyzer, config), calls)
    }

    const FRAME: &str = r#"<!DOCTYPE html><html><div class="Polaris-Frame"></div></html>"#;
    const PARTIAL: &str = r#"<!DOCTYPE html><html><span class="Polaris-Text"></span></html>"#;

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_delay() {
        let catalog = VariantCatalog::new().with_component("widget", ["broken"]);
        let (runner, calls) = runner(
            vec![("--broken", 200, "Cannot destructure property 'x'")],
            RetryPolicy::new(3, Duration::from_millis(2000)),
            false,
        );

        let start = tokio::time::Instant::now();
        let report = runner.run(&catalog).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.outcomes[0].attempts, 3);
        assert_eq!(report.outcomes[0].analysis.render_status, RenderStatus::PropsError);
        assert!(start.elapsed() >= Duration::from_millis(4000));
    }

    /// Browser-mode fetcher whose every attempt is refused
    struct RefusingFetcher {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Fetcher for RefusingFetcher {
        fn mode(&self) -> FetchMode {
            FetchMode::Dynamic
        }

        async fn fetch(&self, target: &FetchTarget) -> ProbeResult<FetchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResult::transport_failure(
                &target.url,
                TransportErrorKind::Fetch,
                "connection refused",
                1,
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dynamic_mode_retries_transport_failures() {
        let config = ProbeConfig {
            mode: FetchMode::Dynamic,
            ..Default::default()
        };
        let calls = Arc::new(AtomicU32::new(0));
        let runner = ProbeRunner::new(
            Box::new(RefusingFetcher {
                calls: calls.clone(),
            }),
            Analyzer::with_defaults().unwrap(),
            RunnerConfig::from_probe_config(&config),
        );
        let catalog = VariantCatalog::new().with_component("widget", ["default"]);

        let start = tokio::time::Instant::now();
        let report = runner.run(&catalog).await;

        let outcome = &report.outcomes[0];
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.analysis.render_status, RenderStatus::FetchFailed);
        assert!(!outcome.passed);
        assert!(start.elapsed() >= Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_run() {
        let catalog = VariantCatalog::new()
            .with_component("widget", ["missing", "default"]);
        let (runner, _) = runner(vec![("--default", 200, FRAME)], RetryPolicy::once(), false);

        let report = runner.run(&catalog).await;

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.outcomes[0].variant, "missing");
        assert_eq!(report.outcomes[1].variant, "default");
        assert_eq!(report.summary.failures[0].variant, "missing");
        assert!(report.summary.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_pass_requires_success_verdict() {
        let catalog = VariantCatalog::new().with_component("widget", ["default", "styled"]);
        let (runner, _) = runner(
            vec![("--default", 200, FRAME), ("--styled", 200, PARTIAL)],
            RetryPolicy::once(),
            false,
        );

        let report = runner.run(&catalog).await;

        assert!(report.outcomes[0].passed);
        assert_eq!(report.outcomes[1].analysis.render_status, RenderStatus::Partial);
        assert!(!report.outcomes[1].passed);
    }

    #[tokio::test]
    async fn test_non_200_with_wrapper_fails() {
        let catalog = VariantCatalog::new().with_component("widget", ["default"]);
        let (runner, _) = runner(vec![("--default", 500, FRAME)], RetryPolicy::once(), false);

        let report = runner.run(&catalog).await;
        assert_eq!(report.outcomes[0].analysis.render_status, RenderStatus::Success);
        assert!(!report.outcomes[0].passed);
    }

    #[tokio::test]
    async fn test_fetcher_error_recorded_as_crash() {
        let catalog = VariantCatalog::new().with_component("widget", ["default"]);
        let (runner, _) = runner(vec![], RetryPolicy::once(), true);

        let report = runner.run(&catalog).await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.fetch.status, None);
        assert_eq!(outcome.analysis.render_status, RenderStatus::Crashed);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = RunSummary::new(Utc::now());
        assert_eq!(summary.success_rate(), 0);
        summary.total = 2;
        summary.passed = 1;
        assert_eq!(summary.success_rate(), 50);
        summary.total = 3;
        assert_eq!(summary.success_rate(), 33);
    }

    #[test]
    fn test_static_mode_single_attempt_by_default() {
        let mut config = ProbeConfig::default();
        assert_eq!(RunnerConfig::from_probe_config(&config).retry.max_attempts, 1);

        config.retry_static = true;
        assert_eq!(RunnerConfig::from_probe_config(&config).retry.max_attempts, 3);

        config.retry_static = false;
        config.mode = FetchMode::Dynamic;
        let retry = RunnerConfig::from_probe_config(&config).retry;
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay, Duration::from_millis(2000));
    }
}
