//! storyprobe CLI - Main Entry Point
//!
//! Fetches every catalog variant from a preview server, classifies it and
//! writes JSON and HTML reports.
//!
//! Exit codes: 0 when the run completes, 1 with `--fail-on-error` and at
//! least one failed variant, 2 on a fatal error.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};

use storyprobe::analyze::{Analyzer, SignatureCatalog};
use storyprobe::catalog::VariantCatalog;
use storyprobe::config::{FetchMode, ProbeConfig};
use storyprobe::fetch::{BrowserFetcher, Fetcher, StaticFetcher};
use storyprobe::report;
use storyprobe::runner::{ProbeRunner, RunnerConfig};

mod output;

use output::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Plain HTTP GET, no script execution
    Static,
    /// Real browser through Playwright
    Dynamic,
}

impl From<ModeArg> for FetchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Static => FetchMode::Static,
            ModeArg::Dynamic => FetchMode::Dynamic,
        }
    }
}

/// storyprobe - verify that preview-server stories actually render
#[derive(Parser, Debug)]
#[command(name = "storyprobe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, env = "STORYPROBE_CONFIG", default_value = "storyprobe.toml")]
    config: PathBuf,

    /// Preview server origin
    #[arg(long, env = "STORYPROBE_BASE_URL")]
    base_url: Option<String>,

    /// Hard bound for one fetch attempt
    #[arg(long, env = "STORYPROBE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Maximum attempts per variant
    #[arg(long, env = "STORYPROBE_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Fetch strategy
    #[arg(long, env = "STORYPROBE_MODE")]
    mode: Option<ModeArg>,

    /// Story id prefix
    #[arg(long)]
    scope: Option<String>,

    /// Variant catalog (YAML)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Only test these components (repeatable)
    #[arg(long = "component")]
    components: Vec<String>,

    /// Signature catalog (TOML)
    #[arg(long)]
    signatures: Option<PathBuf>,

    /// Directory for reports and screenshots
    #[arg(long, env = "STORYPROBE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Do not write screenshots in dynamic mode
    #[arg(long)]
    no_screenshots: bool,

    /// Apply the retry policy in static mode too
    #[arg(long)]
    retry_static: bool,

    /// Exit with status 1 when any variant fails
    #[arg(long)]
    fail_on_error: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags win over the configuration file
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(scope) = &self.scope {
            config.story_scope = scope.clone();
        }
        if let Some(catalog) = &self.catalog {
            config.catalog_path = Some(catalog.clone());
        }
        if let Some(signatures) = &self.signatures {
            config.signatures_path = Some(signatures.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.report.output_dir = output_dir.clone();
        }
        if self.no_screenshots {
            config.browser.screenshots = false;
        }
        if self.retry_static {
            config.retry_static = true;
        }
        if self.fail_on_error {
            config.fail_on_error = true;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

/// Returns whether the process should exit successfully
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = ProbeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let mut catalog = match &config.catalog_path {
        Some(path) => VariantCatalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => VariantCatalog::default(),
    };
    if !cli.components.is_empty() {
        catalog = catalog.filter(&cli.components)?;
    }

    let signatures = match &config.signatures_path {
        Some(path) => SignatureCatalog::load(path)
            .with_context(|| format!("Failed to load signatures {}", path.display()))?,
        None => SignatureCatalog::default(),
    };
    let analyzer = Analyzer::new(signatures)?;

    let fetcher: Box<dyn Fetcher> = match config.mode {
        FetchMode::Static => Box::new(StaticFetcher::new(config.timeout())?),
        FetchMode::Dynamic => {
            let screenshot_dir = config.browser.screenshots.then(|| config.screenshot_dir());
            Box::new(BrowserFetcher::new(
                config.browser.clone(),
                config.timeout(),
                screenshot_dir,
                analyzer.dom_probes().to_vec(),
            )?)
        }
    };

    info!("Base URL: {}", config.base_url);
    info!("Timeout: {} ms", config.timeout_ms);

    let runner = ProbeRunner::new(fetcher, analyzer, RunnerConfig::from_probe_config(&config));
    let run_report = runner.run(&catalog).await;

    let paths = report::write_reports(
        &run_report,
        &config.json_report_path(),
        &config.html_report_path(),
    )
    .context("Failed to write reports")?;

    output::print_report(&run_report, cli.format);
    if cli.format != OutputFormat::Json {
        output::print_success(&format!("JSON report: {}", paths.json.display()));
        output::print_success(&format!("HTML report: {}", paths.html.display()));
    }

    Ok(run_report.summary.failed == 0 || !config.fail_on_error)
}
