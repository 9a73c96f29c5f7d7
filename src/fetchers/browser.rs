//! Headless Chromium fetching (chromiumoxide over CDP).
//!
//! One browser and at most two pages live for the whole run: the main page
//! used for the index and listings, and a lazily opened page for detail
//! visits during enrichment.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ExpandConfig};
use crate::error::ScrapeError;
use crate::expand::{LoadMoreControl, expand};
use crate::traits::{Fetcher, ListingPage};

const VIEWPORT_WIDTH: u32 = 1280;
const VIEWPORT_HEIGHT: u32 = 720;

/// Resolves once the DOM is parsed; does not wait for subresources.
const DOM_READY_SCRIPT: &str = r"
    new Promise((resolve) => {
        if (document.readyState !== 'loading') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
        }
    })
";

fn browser_err(context: &str) -> impl Fn(chromiumoxide::error::CdpError) -> ScrapeError + '_ {
    move |e| ScrapeError::Browser(format!("{context}: {e}"))
}

pub struct RenderedFetcher {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    page: Page,
    detail_page: Mutex<Option<Page>>,
    link_prefix: String,
    settle: Duration,
    detail_settle: Duration,
    ready_timeout: Duration,
    expand: ExpandConfig,
}

impl RenderedFetcher {
    /// Launches a headless browser and opens the main page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Browser`] if Chromium cannot be found or
    /// launched.
    pub async fn launch(config: &AppConfig) -> Result<Self, ScrapeError> {
        info!("Launching headless browser");

        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(Some(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                ..Default::default()
            }))
            .request_timeout(config.request_timeout)
            .arg(format!("--user-agent={}", config.site.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-sandbox");

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(browser_err("failed to launch browser"))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_err("failed to open page"))?;

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            page,
            detail_page: Mutex::new(None),
            link_prefix: config.site.link_prefix.clone(),
            settle: config.settle_delay,
            detail_settle: config.detail_settle_delay,
            ready_timeout: config.request_timeout,
            expand: config.expand.clone(),
        })
    }

    /// Navigates `page` to `url`, waits for DOMContentLoaded, then lets
    /// client-side rendering settle for `settle`.
    async fn navigate(&self, page: &Page, url: &str, settle: Duration) -> Result<(), ScrapeError> {
        debug!("Navigating to {url}");

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScrapeError::InvalidUrl {
                url: url.to_string(),
                reason: e,
            })?;

        let response = page
            .execute(params)
            .await
            .map_err(browser_err("navigation failed"))?;

        if let Some(error_text) = response.result.error_text.as_ref() {
            return Err(ScrapeError::Browser(format!("navigation to {url} failed: {error_text}")));
        }

        match tokio::time::timeout(self.ready_timeout, page.evaluate(DOM_READY_SCRIPT)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Could not check ready state for {url}: {e}"),
            Err(_) => warn!("Timed out waiting for DOMContentLoaded on {url}"),
        }

        tokio::time::sleep(settle).await;
        Ok(())
    }

    async fn content(page: &Page) -> Result<String, ScrapeError> {
        page.content().await.map_err(browser_err("failed to read page content"))
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.navigate(&self.page, url, self.settle).await?;
        Self::content(&self.page).await
    }

    async fn fetch_listing(&self, url: &str) -> Result<String, ScrapeError> {
        self.navigate(&self.page, url, self.settle).await?;
        expand(&self.page, &self.link_prefix, &self.expand).await?;
        Self::content(&self.page).await
    }

    async fn fetch_detail(&self, url: &str) -> Result<String, ScrapeError> {
        let mut slot = self.detail_page.lock().await;
        if slot.is_none() {
            let browser = self.browser.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(browser_err("failed to open enrichment page"))?;
            *slot = Some(page);
        }

        let Some(page) = slot.as_ref() else {
            return Err(ScrapeError::Browser("enrichment page unavailable".to_string()));
        };
        self.navigate(page, url, self.detail_settle).await?;
        Self::content(page).await
    }

    async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Browser close error: {e}");
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser wait error: {e}");
        }
        self.handler.abort();
    }
}

/// JavaScript that clicks the first element matching `control` if visible.
///
/// Evaluates to `true` only when a click happened.
pub(crate) fn click_script(control: &LoadMoreControl) -> String {
    let css = serde_json::Value::from(control.css);
    let text = control
        .text
        .map_or(serde_json::Value::Null, |t| serde_json::Value::from(t.to_lowercase()));

    format!(
        r"(() => {{
    const wanted = {text};
    const el = Array.from(document.querySelectorAll({css}))
        .find((e) => wanted === null || (e.textContent || '').toLowerCase().includes(wanted));
    if (!el) return false;
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (rect.width === 0 || rect.height === 0 || style.visibility === 'hidden' || style.display === 'none') {{
        return false;
    }}
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    return true;
}})()"
    )
}

#[async_trait]
impl ListingPage for Page {
    async fn scroll_to_bottom(&self) -> Result<(), ScrapeError> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map(|_| ())
            .map_err(browser_err("scroll failed"))
    }

    async fn click_load_more(&self, control: &LoadMoreControl) -> Result<bool, ScrapeError> {
        let result = self
            .evaluate(click_script(control))
            .await
            .map_err(browser_err("load more click failed"))?;

        result
            .into_value::<bool>()
            .map_err(|e| ScrapeError::Browser(format!("unexpected click result: {e}")))
    }

    async fn count_links(&self, prefix: &str) -> Result<usize, ScrapeError> {
        let selector = serde_json::Value::from(format!("a[href^='{prefix}']"));
        let result = self
            .evaluate(format!("document.querySelectorAll({selector}).length"))
            .await
            .map_err(browser_err("link count failed"))?;

        result
            .into_value::<usize>()
            .map_err(|e| ScrapeError::Browser(format!("unexpected link count: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::LOAD_MORE_CONTROLS;

    #[test]
    fn click_script_embeds_escaped_selector_and_lowercased_text() {
        let script = click_script(&LOAD_MORE_CONTROLS[1]);
        assert!(script.contains(r#"const wanted = "load more offers";"#));
        assert!(script.contains(r#"document.querySelectorAll("button")"#));
    }

    #[test]
    fn click_script_without_text_matches_any_element() {
        let script = click_script(&LOAD_MORE_CONTROLS[5]);
        assert!(script.contains("const wanted = null;"));
        assert!(script.contains(r#"querySelectorAll(".ThemeThreePagination .lodemorecontent button")"#));
    }
}
