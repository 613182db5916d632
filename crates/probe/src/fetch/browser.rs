//! Dynamic fetch through a Playwright driver process
//!
//! One Node.js driver is launched per run and reused across variants. The
//! driver reads one JSON request per line on stdin and answers with one JSON
//! line on stdout. Every request runs in a fresh browser context that is
//! closed afterwards, so cookies and loaded scripts never leak between
//! variants.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::http::{ACCEPT_HTML, ACCEPT_LANGUAGE_EN};
use super::{BrowserCapture, FetchResult, FetchTarget, Fetcher, TransportErrorKind};
use crate::analyze::DomProbe;
use crate::config::{BrowserConfig, FetchMode};
use crate::error::{ProbeError, ProbeResult};

/// Extra time granted on top of navigation timeout + settle delay before the
/// driver is considered hung
const DRIVER_GRACE: Duration = Duration::from_secs(15);

/// How long to wait for the driver to launch the browser
const DRIVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

const DRIVER_SCRIPT: &str = r##"
const readline = require('readline');

const options = JSON.parse(process.argv[2] || '{}');

function emit(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function emptyCapture() {
  return { console: [], page_errors: [], failed_requests: [], dom: {}, body_text: '', screenshots: [] };
}

async function fetchPage(browser, request) {
  const started = Date.now();
  const capture = emptyCapture();
  let context;
  try {
    context = await browser.newContext({
      viewport: { width: options.width, height: options.height },
      extraHTTPHeaders: request.headers || {},
    });
    const page = await context.newPage();

    page.on('console', msg => {
      const loc = msg.location();
      capture.console.push({
        type: msg.type(),
        text: msg.text(),
        location: loc && loc.url ? `${loc.url}:${loc.lineNumber}:${loc.columnNumber}` : undefined,
      });
    });
    page.on('pageerror', error => capture.page_errors.push(error.message));
    page.on('requestfailed', req => {
      const failure = req.failure();
      capture.failed_requests.push({
        url: req.url(),
        method: req.method(),
        error: failure ? failure.errorText : 'Unknown error',
      });
    });

    let response;
    try {
      response = await page.goto(request.url, { waitUntil: 'networkidle', timeout: request.timeout_ms });
    } catch (error) {
      return { ok: false, kind: 'navigation', message: error.message, elapsed_ms: Date.now() - started, ...capture };
    }

    if (request.initial_screenshot) {
      await page.screenshot({ path: request.initial_screenshot, fullPage: true });
      capture.screenshots.push(request.initial_screenshot);
    }

    await page.waitForTimeout(request.settle_ms);

    for (const probe of request.probes || []) {
      try {
        capture.dom[probe.name] = (await page.$$(probe.selector)).length;
      } catch (error) {
        capture.dom[probe.name] = 0;
      }
    }
    capture.body_text = await page.evaluate(() => (document.body ? document.body.innerText : ''));
    const content = await page.content();

    if (request.final_screenshot) {
      await page.screenshot({ path: request.final_screenshot, fullPage: true });
      capture.screenshots.push(request.final_screenshot);
    }

    return {
      ok: true,
      status: response ? response.status() : null,
      status_text: response ? response.statusText() : null,
      content,
      elapsed_ms: Date.now() - started,
      ...capture,
    };
  } catch (error) {
    return { ok: false, kind: 'crash', message: error.message, elapsed_ms: Date.now() - started, ...capture };
  } finally {
    if (context) {
      await context.close().catch(() => {});
    }
  }
}

async function main() {
  let playwright;
  try {
    playwright = require(require.resolve('playwright', { paths: [process.cwd()] }));
  } catch (error) {
    emit({ ready: false, message: 'playwright module not found: ' + error.message });
    process.exit(1);
  }

  const browser = await playwright.chromium.launch({
    headless: options.headless !== false,
    args: ['--no-sandbox', '--disable-setuid-sandbox', '--disable-dev-shm-usage'],
  });
  emit({ ready: true, version: browser.version() });

  const lines = readline.createInterface({ input: process.stdin, terminal: false });
  for await (const line of lines) {
    if (!line.trim()) {
      continue;
    }
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      emit({ ok: false, kind: 'crash', message: 'malformed request: ' + error.message });
      continue;
    }
    if (request.cmd === 'close') {
      break;
    }
    emit(await fetchPage(browser, request));
  }

  await browser.close();
}

main().catch(error => {
  emit({ ready: false, message: error.message });
  process.exit(1);
});
"##;

/// Fetches pages in a real browser engine
pub struct BrowserFetcher {
    config: BrowserConfig,
    timeout: Duration,
    screenshot_dir: Option<PathBuf>,
    probes: Vec<DomProbe>,
    driver: Mutex<Option<DriverProcess>>,
}

struct DriverProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    _script_dir: tempfile::TempDir,
}

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    cmd: &'static str,
    url: &'a str,
    timeout_ms: u64,
    settle_ms: u64,
    initial_screenshot: Option<String>,
    final_screenshot: Option<String>,
    probes: &'a [DomProbe],
    headers: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Deserialize)]
struct DriverReady {
    ready: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriverResponse {
    ok: bool,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    status_text: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    elapsed_ms: u64,
    #[serde(flatten)]
    capture: BrowserCapture,
}

impl BrowserFetcher {
    /// Create a dynamic fetcher; fails when Playwright is not installed
    pub fn new(
        config: BrowserConfig,
        timeout: Duration,
        screenshot_dir: Option<PathBuf>,
        probes: Vec<DomProbe>,
    ) -> ProbeResult<Self> {
        Self::check_playwright_installed(&config.project_dir)?;

        if let Some(dir) = &screenshot_dir {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            config,
            timeout,
            screenshot_dir,
            probes,
            driver: Mutex::new(None),
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(project_dir: &Path) -> ProbeResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(ProbeError::PlaywrightNotFound),
        }
    }

    /// Screenshot paths for an attempt: the initial one only on attempt 1
    fn screenshot_paths(&self, target: &FetchTarget) -> (Option<String>, Option<String>) {
        let Some(dir) = &self.screenshot_dir else {
            return (None, None);
        };
        let stem = format!("screenshot-{}-{}", target.component, target.variant);
        let initial = (target.attempt == 1)
            .then(|| dir.join(format!("{}-initial.png", stem)).to_string_lossy().to_string());
        let final_shot = dir
            .join(format!("{}-final-{}.png", stem, target.attempt))
            .to_string_lossy()
            .to_string();
        (initial, Some(final_shot))
    }

    fn build_request<'a>(&'a self, target: &'a FetchTarget) -> DriverRequest<'a> {
        let (initial_screenshot, final_screenshot) = self.screenshot_paths(target);
        let mut headers = BTreeMap::new();
        headers.insert("Accept", ACCEPT_HTML);
        headers.insert("Accept-Language", ACCEPT_LANGUAGE_EN);

        DriverRequest {
            cmd: "fetch",
            url: &target.url,
            timeout_ms: self.timeout.as_millis() as u64,
            settle_ms: self.config.settle_ms,
            initial_screenshot,
            final_screenshot,
            probes: &self.probes,
            headers,
        }
    }

    async fn launch(&self) -> ProbeResult<DriverProcess> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("storyprobe-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let options = serde_json::json!({
            "headless": self.config.headless,
            "width": self.config.viewport_width,
            "height": self.config.viewport_height,
        });

        debug!("Launching browser driver: {}", script_path.display());

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .arg(options.to_string())
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProbeError::Driver(format!(
                    "failed to spawn {}: {}",
                    self.config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProbeError::Driver("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Driver("driver stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[driver] {}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        let line = match tokio::time::timeout(DRIVER_STARTUP_TIMEOUT, stdout.next_line()).await {
            Ok(line) => line?.ok_or(ProbeError::DriverExited)?,
            Err(_) => return Err(ProbeError::Timeout("browser driver startup".into())),
        };
        let ready: DriverReady = serde_json::from_str(&line)?;
        if !ready.ready {
            return Err(ProbeError::Driver(
                ready.message.unwrap_or_else(|| "driver failed to start".into()),
            ));
        }

        info!(
            "Browser driver ready (chromium {})",
            ready.version.as_deref().unwrap_or("unknown")
        );

        Ok(DriverProcess {
            child,
            stdin,
            stdout,
            _script_dir: script_dir,
        })
    }

    async fn exchange(&self, driver: &mut DriverProcess, request: &DriverRequest<'_>) -> ProbeResult<String> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        driver.stdin.write_all(line.as_bytes()).await?;
        driver.stdin.flush().await?;

        let deadline = self.timeout + Duration::from_millis(self.config.settle_ms) + DRIVER_GRACE;
        match tokio::time::timeout(deadline, driver.stdout.next_line()).await {
            Ok(line) => line?.ok_or(ProbeError::DriverExited),
            Err(_) => Err(ProbeError::Timeout(format!("browser driver response for {}", request.url))),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for BrowserFetcher {
    fn mode(&self) -> FetchMode {
        FetchMode::Dynamic
    }

    async fn fetch(&self, target: &FetchTarget) -> ProbeResult<FetchResult> {
        let start = Instant::now();
        let mut guard = self.driver.lock().await;

        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let request = self.build_request(target);

        let exchanged = match guard.as_mut() {
            Some(driver) => self.exchange(driver, &request).await,
            None => Err(ProbeError::DriverExited),
        };

        match exchanged {
            Ok(line) => parse_response(&line, &target.url, start),
            Err(e) => {
                // The driver is in an unknown state; drop it so the next fetch relaunches
                if let Some(mut driver) = guard.take() {
                    let _ = driver.child.kill().await;
                }
                warn!("Browser driver failed on {}: {}", target.url, e);
                Err(e)
            }
        }
    }

    async fn shutdown(&self) -> ProbeResult<()> {
        let Some(mut driver) = self.driver.lock().await.take() else {
            return Ok(());
        };

        debug!("Closing browser driver");
        let close = async {
            driver.stdin.write_all(b"{\"cmd\":\"close\"}\n").await?;
            driver.stdin.flush().await?;
            driver.child.wait().await
        };
        let closed = tokio::time::timeout(Duration::from_secs(10), close).await;
        match closed {
            Ok(Ok(_)) => Ok(()),
            _ => {
                let _ = driver.child.kill().await;
                Ok(())
            }
        }
    }
}

/// Convert one driver response line into a [`FetchResult`]
fn parse_response(line: &str, url: &str, start: Instant) -> ProbeResult<FetchResult> {
    let response: DriverResponse = serde_json::from_str(line)?;
    let elapsed_ms = if response.elapsed_ms > 0 {
        response.elapsed_ms
    } else {
        start.elapsed().as_millis() as u64
    };

    let mut result = if response.ok {
        let mut result = FetchResult::response(url, 0, response.content, elapsed_ms);
        result.status = response.status;
        result.status_text = response.status_text;
        result
    } else {
        let kind = match response.kind.as_deref() {
            Some("navigation") => TransportErrorKind::Navigation,
            _ => TransportErrorKind::Crash,
        };
        FetchResult::transport_failure(
            url,
            kind,
            response.message.unwrap_or_else(|| "unknown driver error".into()),
            elapsed_ms,
        )
    };
    result.browser = Some(response.capture);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_successful_response() {
        let line = r#"{"ok":true,"status":200,"status_text":"OK","content":"<html></html>","elapsed_ms":812,
            "console":[{"type":"error","text":"Warning: boom","location":"http://x/a.js:1:2"}],
            "page_errors":["ReferenceError: x is not defined"],
            "failed_requests":[{"url":"http://x/font.woff","method":"GET","error":"net::ERR_FAILED"}],
            "dom":{"frameComponent":2},"body_text":"Hello","screenshots":["shots/a.png"]}"#;
        let result = parse_response(line, "http://x/iframe.html", Instant::now()).unwrap();

        assert_eq!(result.status, Some(200));
        assert_eq!(result.status_text.as_deref(), Some("OK"));
        assert_eq!(result.elapsed_ms, 812);
        assert_eq!(result.content_length, 13);
        assert!(result.errors.is_empty());

        let capture = result.browser.unwrap();
        assert_eq!(capture.console.len(), 1);
        assert!(capture.console[0].is_error());
        assert_eq!(capture.page_errors.len(), 1);
        assert_eq!(capture.failed_requests[0].error, "net::ERR_FAILED");
        assert_eq!(capture.dom.get("frameComponent"), Some(&2));
        assert_eq!(capture.body_text, "Hello");
        assert_eq!(capture.screenshots, vec![PathBuf::from("shots/a.png")]);
    }

    #[test]
    fn test_parse_navigation_failure() {
        let line = r#"{"ok":false,"kind":"navigation","message":"net::ERR_CONNECTION_REFUSED","elapsed_ms":5,
            "console":[],"page_errors":[],"failed_requests":[],"dom":{},"body_text":"","screenshots":[]}"#;
        let result = parse_response(line, "http://x/iframe.html", Instant::now()).unwrap();

        assert_eq!(result.status, None);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, TransportErrorKind::Navigation);
        assert!(result.errors[0].message.contains("ERR_CONNECTION_REFUSED"));
        assert!(result.browser.is_some());
    }

    #[test]
    fn test_parse_unknown_failure_is_crash() {
        let line = r#"{"ok":false,"message":"Target closed"}"#;
        let result = parse_response(line, "u", Instant::now()).unwrap();
        assert_eq!(result.transport_error_kind(), Some(TransportErrorKind::Crash));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_response("not json", "u", Instant::now()),
            Err(ProbeError::Json(_))
        ));
    }

    #[test]
    fn test_driver_script_speaks_protocol() {
        assert!(DRIVER_SCRIPT.contains("waitUntil: 'networkidle'"));
        assert!(DRIVER_SCRIPT.contains("request.settle_ms"));
        assert!(DRIVER_SCRIPT.contains("requestfailed"));
        assert!(DRIVER_SCRIPT.contains("request.cmd === 'close'"));
    }
}
