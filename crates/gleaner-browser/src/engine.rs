use crate::error::{BrowserError, Result};
use crate::fingerprint::{FingerprintConfig, STEALTH_SCRIPT};
use crate::session::{extract_domain, BrowserSession, LOCATION_SCRIPT};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const CLICKABLE_POLL: Duration = Duration::from_millis(250);

/// Chromium-backed browser session driving a single tab
pub struct BrowserEngine {
    #[allow(dead_code)]
    browser: Browser,
    page: Page,
    fingerprint: FingerprintConfig,
    navigation_timeout: Duration,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch chromium with default settings
    pub async fn new() -> Result<Self> {
        Self::launch(&gleaner_core::BrowserConfig::default()).await
    }

    /// Launch chromium and open the working tab
    pub async fn launch(settings: &gleaner_core::BrowserConfig) -> Result<Self> {
        let fingerprint = FingerprintConfig::from_config(settings);

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-gpu");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        page.set_user_agent(SetUserAgentOverrideParams::new(fingerprint.user_agent.clone()))
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        tracing::info!(
            headless = settings.headless,
            user_agent = %fingerprint.user_agent,
            "Browser session launched"
        );

        Ok(Self {
            browser,
            page,
            fingerprint,
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            handler,
        })
    }

    /// The identity presented by this session
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;

        // Statements such as scrollTo evaluate to undefined
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }
}

impl Drop for BrowserEngine {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Run a navigation step, failing with `Timeout` once `limit` elapses
async fn within<F>(limit: Duration, url: &str, step: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::time::timeout(limit, step).await.unwrap_or_else(|_| {
        Err(BrowserError::Timeout(format!(
            "navigation to {url} exceeded {}s",
            limit.as_secs()
        )))
    })
}

/// Quote a selector as a JS string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserSession for BrowserEngine {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let domain = extract_domain(url)?;
        tracing::debug!(%domain, "Navigating to {}", url);

        let page = &self.page;
        let load = async {
            page.goto(url)
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
            // Late redirects are common on news sites; a failed wait is not fatal
            if let Err(e) = page.wait_for_navigation().await {
                tracing::debug!(url, error = %e, "Navigation did not settle");
            }
            Ok(())
        };
        within(self.navigation_timeout, url, load).await
    }

    async fn current_html(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn current_url(&mut self) -> Result<String> {
        let value = self.eval(LOCATION_SCRIPT).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::ScriptError("location is not a string".to_string()))
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
        self.eval(script).await
    }

    async fn element_exists(&mut self, selector: &str) -> Result<bool> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    async fn wait_for_clickable(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el || el.disabled) return false; \
             const r = el.getBoundingClientRect(); \
             return r.width > 0 && r.height > 0; }})()",
            js_string(selector)
        );

        let started = Instant::now();
        loop {
            if self.eval(&script).await?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout(format!(
                    "{selector} not clickable after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(CLICKABLE_POLL).await;
        }
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.scrollIntoView(true); return true; }})()",
            js_string(selector)
        );
        if self.eval(&script).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn script_click(&mut self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.click(); return true; }})()",
            js_string(selector)
        );
        if self.eval(&script).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn pointer_click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(())
    }

    async fn download(&mut self, url: &str) -> Result<Vec<u8>> {
        let script = format!(
            "(async () => {{ const r = await fetch({}, {{ credentials: 'include' }}); \
             if (!r.ok) return {{ status: r.status }}; \
             const buf = new Uint8Array(await r.arrayBuffer()); \
             return {{ status: r.status, bytes: Array.from(buf) }}; }})()",
            js_string(url)
        );
        let value = self.eval(&script).await?;

        let status = value.get("status").and_then(serde_json::Value::as_u64);
        match value.get("bytes") {
            Some(bytes) => serde_json::from_value(bytes.clone()).map_err(|e| {
                BrowserError::DownloadError {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Err(BrowserError::DownloadError {
                url: url.to_string(),
                reason: match status {
                    Some(code) => format!("status {code}"),
                    None => "no response".to_string(),
                },
            }),
        }
    }
}
