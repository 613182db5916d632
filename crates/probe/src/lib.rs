//! storyprobe: rendered-artifact verification for preview servers
//!
//! This crate fetches every (component, variant) story from a running
//! Storybook-style preview server and decides whether it rendered:
//! - Fetches markup with a plain HTTP GET or a Playwright-driven browser
//! - Classifies the result against a data-driven signature catalog
//! - Retries failed variants with a fixed delay
//! - Writes JSON and HTML reports plus a console summary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ProbeRunner (orchestrator)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VariantCatalog ──▶ story_url(base, scope, comp, variant)   │
//! │                                                             │
//! │  retry(policy)                                              │
//! │    └── Fetcher (trait object)                               │
//! │          ├── StaticFetcher   HTTP GET via reqwest           │
//! │          └── BrowserFetcher  Node + Playwright driver       │
//! │                               (line-delimited JSON)         │
//! │                                                             │
//! │  Analyzer (SignatureCatalog) ──▶ AnalysisResult + verdict   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunReport ──▶ report::{write_json, write_html,             │
//! │                         console_summary}                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod analyze;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod report;
pub mod retry;
pub mod runner;

pub use analyze::{AnalysisResult, Analyzer, ErrorCategory, RenderStatus, SignatureCatalog};
pub use catalog::VariantCatalog;
pub use config::{FetchMode, ProbeConfig};
pub use error::{ProbeError, ProbeResult};
pub use fetch::{BrowserFetcher, FetchResult, Fetcher, StaticFetcher};
pub use runner::{ProbeRunner, RunReport, RunSummary, RunnerConfig, TestOutcome};
