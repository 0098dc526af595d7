//! Shared headless browser service
//!
//! One Chromium process is launched lazily and reused for every rendered
//! acquisition in a run. Pages are opened under a read lock and closed
//! without holding it, so a new page can be requested while another page
//! is closing. `close_all` takes the write lock and must be called once
//! the batch is done.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use scout_core::ScrapeMethod;

use crate::{FetchConfig, FetchError, FetchedPage, Transport, UrlGuard};

/// Browser rendering capability with an explicit lifecycle
#[async_trait]
pub trait BrowserService: Transport {
    /// Start the shared browser if it isn't running
    async fn open(&self) -> Result<(), FetchError>;

    /// Full-page PNG of a URL
    async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Release the shared browser; safe to call when nothing is open
    async fn close_all(&self);
}

struct BrowserHandle {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Chromium-backed implementation of [`BrowserService`]
pub struct ChromeBrowser {
    config: FetchConfig,
    guard: UrlGuard,
    inner: RwLock<Option<BrowserHandle>>,
}

impl ChromeBrowser {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            guard: UrlGuard::new(config.allow_private_hosts),
            config,
            inner: RwLock::new(None),
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.config.browser_timeout_secs)
    }

    fn timed_out(&self) -> FetchError {
        FetchError::Timeout(self.config.browser_timeout_secs)
    }

    fn browser_config(&self) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(self.config.browser_timeout_secs))
            .args([
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-blink-features=AutomationControlled",
                "--disable-extensions",
                "--no-first-run",
            ]);
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(FetchError::Browser)
    }

    async fn new_page(&self, url: &str) -> Result<Page, FetchError> {
        self.open().await?;
        let guard = self.inner.read().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser closed while opening page".to_string()))?;
        handle
            .browser
            .new_page(url)
            .await
            .map_err(|e| FetchError::Browser(format!("new page: {}", e)))
    }

    /// Open a page and let it settle. On every failure path, including the
    /// deadline, the page is closed before returning.
    async fn load(&self, url: &str, deadline: Instant) -> Result<(Page, String), FetchError> {
        let page = timeout_at(deadline, self.new_page(url))
            .await
            .map_err(|_| self.timed_out())??;

        let settle_ms = self.config.render_settle_ms;
        let settled = timeout_at(deadline, async {
            page.wait_for_navigation()
                .await
                .map_err(|e| FetchError::Browser(format!("navigation: {}", e)))?;
            if settle_ms > 0 {
                tokio::time::sleep(Duration::from_millis(settle_ms)).await;
            }
            page.url()
                .await
                .map_err(|e| FetchError::Browser(format!("url: {}", e)))
        })
        .await;

        let final_url = match settled {
            Ok(Ok(landed)) => landed.unwrap_or_else(|| url.to_string()),
            Ok(Err(e)) => {
                close_page(page).await;
                return Err(e);
            }
            Err(_) => {
                close_page(page).await;
                return Err(self.timed_out());
            }
        };

        if let Err(FetchError::Blocked(_)) = self.guard.check(&final_url) {
            close_page(page).await;
            return Err(FetchError::Blocked(format!("redirect target {}", final_url)));
        }
        Ok((page, final_url))
    }

    async fn render_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let deadline = self.deadline();
        let (page, final_url) = self.load(url, deadline).await?;

        let html = timeout_at(deadline, page.content()).await;
        close_page(page).await;

        let html = html
            .map_err(|_| self.timed_out())?
            .map_err(|e| FetchError::Browser(format!("content: {}", e)))?;
        if html.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(FetchedPage {
            final_url,
            status: None,
            html,
        })
    }
}

async fn close_page(page: Page) {
    if let Err(e) = page.close().await {
        debug!("Page close failed: {}", e);
    }
}

#[async_trait]
impl Transport for ChromeBrowser {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::RenderedBrowser
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!("Rendering {} (timeout {}s)", url, self.config.browser_timeout_secs);
        self.render_page(url).await
    }
}

#[async_trait]
impl BrowserService for ChromeBrowser {
    async fn open(&self) -> Result<(), FetchError> {
        if self.inner.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.inner.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| FetchError::Browser(format!("launch: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        info!("Launched shared headless browser");
        *guard = Some(BrowserHandle { browser, handler });
        Ok(())
    }

    async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let deadline = self.deadline();
        let (page, _) = self.load(url, deadline).await?;

        let shot = timeout_at(deadline, page.screenshot(ScreenshotParams::builder().full_page(true).build())).await;
        close_page(page).await;

        shot.map_err(|_| self.timed_out())?
            .map_err(|e| FetchError::Browser(format!("screenshot: {}", e)))
    }

    async fn close_all(&self) {
        let Some(mut handle) = self.inner.write().await.take() else {
            return;
        };

        if let Err(e) = handle.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = handle.browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
        handle.handler.abort();
        info!("Closed shared headless browser");
    }
}
