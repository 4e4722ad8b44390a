use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::AppError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where a failed scrape leaves its screenshot and page source.
pub const ERROR_SCREENSHOT: &str = "scrape_error_screenshot.png";
pub const ERROR_PAGE_SOURCE: &str = "scrape_error_html.txt";

/// The handful of browser operations the site pages are written against.
/// Selectors are CSS.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), AppError>;

    async fn click(&self, selector: &str) -> Result<(), AppError>;

    /// Click the first element matching `selector` whose text contains
    /// `text` (case-insensitive). Returns the visible texts when nothing matched.
    async fn click_text(&self, selector: &str, text: &str) -> Result<(), AppError>;

    /// Focus the element, clear it, and type `text`.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AppError>;

    /// Whether a matching element is currently rendered with a non-empty box.
    async fn is_visible(&self, selector: &str) -> Result<bool, AppError>;

    /// Full current page source.
    async fn content(&self) -> Result<String, AppError>;

    async fn scroll_to_bottom(&self) -> Result<(), AppError>;

    async fn save_screenshot(&self, path: &Path) -> Result<(), AppError>;

    /// Close the browser. Every exit path of a scrape ends here.
    async fn quit(&self) -> Result<(), AppError>;

    /// Poll `is_visible` until it holds or `timeout` elapses.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<bool, AppError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Like `wait_visible`, but a timeout is an error.
    async fn require_visible(&self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        if self.wait_visible(selector, timeout).await? {
            Ok(())
        } else {
            Err(AppError::Navigation(format!(
                "'{selector}' not visible after {}s",
                timeout.as_secs()
            )))
        }
    }

    /// Dump a screenshot and the page source for postmortem debugging.
    /// Best effort: each artifact is attempted even if the other fails.
    async fn save_artifacts(&self, screenshot: &Path, page_source: &Path) {
        match self.save_screenshot(screenshot).await {
            Ok(()) => tracing::info!("Saved screenshot to {}", screenshot.display()),
            Err(e) => tracing::warn!("Could not save screenshot: {e}"),
        }
        match self.content().await {
            Ok(html) => match tokio::fs::write(page_source, html).await {
                Ok(()) => tracing::info!("Saved page source to {}", page_source.display()),
                Err(e) => tracing::warn!("Could not write page source: {e}"),
            },
            Err(e) => tracing::warn!("Could not read page source: {e}"),
        }
    }
}

/// A Chrome session over the DevTools protocol with a single tab.
pub struct ChromeDriver {
    browser: Mutex<Browser>,
    page: Page,
    events: JoinHandle<()>,
}

impl ChromeDriver {
    pub async fn launch(headless: bool) -> Result<ChromeDriver, AppError> {
        tracing::info!("Starting chrome (headless={headless})");
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| AppError::Navigation(format!("Invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser event stream ended: {e}");
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        Ok(ChromeDriver {
            browser: Mutex::new(browser),
            page,
            events,
        })
    }

    async fn eval_bool(&self, script: String) -> Result<bool, AppError> {
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }
}

/// JavaScript string literal for `s`.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        tracing::debug!("Navigating to {url}");
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), AppError> {
        tracing::debug!("Clicking '{selector}'");
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<(), AppError> {
        tracing::debug!("Clicking '{selector}' containing '{text}'");
        let script = format!(
            "(() => {{
                const wanted = {text}.toLowerCase();
                const el = [...document.querySelectorAll({selector})]
                    .find(e => e.innerText.toLowerCase().includes(wanted));
                if (!el) return false;
                el.scrollIntoView();
                el.click();
                return true;
            }})()",
            text = js_str(text),
            selector = js_str(selector),
        );
        if self.eval_bool(script).await? {
            return Ok(());
        }
        let listing = format!(
            "JSON.stringify([...document.querySelectorAll({})].map(e => e.innerText.trim()))",
            js_str(selector)
        );
        let visible = self
            .page
            .evaluate(listing)
            .await?
            .into_value::<String>()
            .unwrap_or_default();
        Err(AppError::Navigation(format!(
            "no '{selector}' containing '{text}' (visible: {visible})"
        )))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AppError> {
        tracing::debug!("Typing '{text}' into '{selector}'");
        let clear = format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; return !!el; }})()",
            js_str(selector)
        );
        self.eval_bool(clear).await?;
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(text)
            .await?;
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, AppError> {
        let script = format!(
            "(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const r = el.getBoundingClientRect();
                return r.width > 0 && r.height > 0 && getComputedStyle(el).visibility !== 'hidden';
            }})()",
            js_str(selector)
        );
        self.eval_bool(script).await
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self.page.content().await?)
    }

    async fn scroll_to_bottom(&self) -> Result<(), AppError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), AppError> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        Ok(())
    }

    async fn quit(&self) -> Result<(), AppError> {
        tracing::info!("Quitting chrome...");
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.events.abort();
        closed?;
        Ok(())
    }
}
