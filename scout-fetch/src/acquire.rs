//! Content acquisition with a cost-ordered fallback chain
//!
//! direct HTTP -> bypass proxy -> rendered browser, stopping at the first
//! success. The shared browser is owned here and released by `close_browser`.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use scout_core::{AcquiredContent, ScrapeMethod};

use crate::browser::{BrowserService, ChromeBrowser};
use crate::guard::UrlGuard;
use crate::parse::extract_content;
use crate::transport::{BypassTransport, FetchedPage, HttpTransport, Transport};
use crate::{FetchConfig, FetchError};

/// Per-call acquisition options
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Bypass proxy for this call only, overriding the configured one
    pub bypass_proxy_url: Option<String>,
    pub skip_bypass: bool,
    pub skip_render: bool,
    /// Tried first, even when the skip flags would exclude it
    pub preferred_method: Option<ScrapeMethod>,
}

impl AcquireOptions {
    pub fn with_preferred(mut self, method: ScrapeMethod) -> Self {
        self.preferred_method = Some(method);
        self
    }

    pub fn with_bypass_proxy(mut self, url: &str) -> Self {
        self.bypass_proxy_url = Some(url.to_string());
        self
    }

    pub fn without_render(mut self) -> Self {
        self.skip_render = true;
        self
    }

    pub fn without_bypass(mut self) -> Self {
        self.skip_bypass = true;
        self
    }
}

/// Content acquisition service
pub struct Acquirer {
    config: FetchConfig,
    guard: UrlGuard,
    direct: Arc<dyn Transport>,
    bypass: Option<Arc<dyn Transport>>,
    browser: Arc<dyn BrowserService>,
}

impl Acquirer {
    /// Build the production transports from configuration
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let direct: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        let bypass: Option<Arc<dyn Transport>> = match &config.bypass_proxy_url {
            Some(proxy) => Some(Arc::new(BypassTransport::new(proxy, &config)?)),
            None => None,
        };
        let browser: Arc<dyn BrowserService> = Arc::new(ChromeBrowser::new(config.clone()));
        Ok(Self::with_transports(config, direct, bypass, browser))
    }

    /// Assemble from explicit transports
    pub fn with_transports(
        config: FetchConfig,
        direct: Arc<dyn Transport>,
        bypass: Option<Arc<dyn Transport>>,
        browser: Arc<dyn BrowserService>,
    ) -> Self {
        Self {
            guard: UrlGuard::new(config.allow_private_hosts),
            config,
            direct,
            bypass,
            browser,
        }
    }

    pub fn guard(&self) -> &UrlGuard {
        &self.guard
    }

    /// Methods to attempt, in order
    fn plan(&self, options: &AcquireOptions) -> Vec<ScrapeMethod> {
        let mut plan = Vec::with_capacity(3);
        if let Some(preferred) = options.preferred_method {
            plan.push(preferred);
        }
        for method in ScrapeMethod::CHAIN {
            if Some(method) == options.preferred_method {
                continue;
            }
            let enabled = match method {
                ScrapeMethod::DirectHttp => true,
                ScrapeMethod::BypassProxy => {
                    !options.skip_bypass && (options.bypass_proxy_url.is_some() || self.bypass.is_some())
                }
                ScrapeMethod::RenderedBrowser => !options.skip_render,
            };
            if enabled {
                plan.push(method);
            }
        }
        plan
    }

    async fn fetch_with(
        &self,
        method: ScrapeMethod,
        url: &str,
        options: &AcquireOptions,
    ) -> Result<FetchedPage, FetchError> {
        match method {
            ScrapeMethod::DirectHttp => self.direct.fetch(url).await,
            ScrapeMethod::BypassProxy => match (&options.bypass_proxy_url, &self.bypass) {
                (Some(proxy), _) => BypassTransport::new(proxy, &self.config)?.fetch(url).await,
                (None, Some(bypass)) => bypass.fetch(url).await,
                (None, None) => Err(FetchError::NotConfigured("bypass proxy URL".to_string())),
            },
            ScrapeMethod::RenderedBrowser => self.browser.fetch(url).await,
        }
    }

    /// Redirects must not land on a host the guard would have refused
    fn check_landing(&self, page: FetchedPage) -> Result<FetchedPage, FetchError> {
        match self.guard.check(&page.final_url) {
            Err(FetchError::Blocked(_)) => Err(FetchError::Blocked(format!("redirect target {}", page.final_url))),
            _ => Ok(page),
        }
    }

    /// Acquire one URL
    ///
    /// Never returns an error: failures are reported through
    /// `AcquiredContent::success`/`error`.
    pub async fn acquire(&self, url: &str, options: &AcquireOptions) -> AcquiredContent {
        let started = Instant::now();
        let url = url.trim();

        let target = match self.guard.check(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Rejected {}: {}", url, e);
                return AcquiredContent::failed(url, e.to_string(), elapsed_ms(started));
            }
        };

        let mut failures = Vec::new();
        let mut last_method = None;

        for method in self.plan(options) {
            last_method = Some(method);
            debug!("Acquiring {} via {}", url, method);

            let fetched = self
                .fetch_with(method, target.as_str(), options)
                .await
                .and_then(|page| self.check_landing(page));
            match fetched {
                Ok(page) => {
                    let parsed = extract_content(&page.html);
                    let elapsed = elapsed_ms(started);
                    info!("Acquired {} via {} in {}ms", url, method, elapsed);
                    return AcquiredContent::succeeded(url, page.html, parsed.text, method, elapsed);
                }
                Err(e) if e.is_validation() => {
                    warn!("Rejected {} via {}: {}", url, method, e);
                    let mut content = AcquiredContent::failed(url, e.to_string(), elapsed_ms(started));
                    content.method = Some(method);
                    return content;
                }
                Err(e) => {
                    debug!("{} failed for {}: {}", method, url, e);
                    failures.push(format!("{}: {}", method, e));
                }
            }
        }

        warn!("All acquisition methods failed for {}", url);
        let mut content = AcquiredContent::failed(
            url,
            format!("All acquisition methods failed ({})", failures.join("; ")),
            elapsed_ms(started),
        );
        content.method = last_method;
        content
    }

    /// Full-page PNG through the shared browser
    pub async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let target = self.guard.check(url)?;
        self.browser.screenshot(target.as_str()).await
    }

    /// Release the shared browser; call once at the end of a batch
    pub async fn close_browser(&self) {
        self.browser.close_all().await;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Outcome {
        Html(String),
        /// Page served after a redirect to another URL
        Redirected(String),
        Blocked,
        Status(u16),
    }

    struct FakeTransport {
        method: ScrapeMethod,
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn new(method: ScrapeMethod, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                method,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    fn respond(outcome: &Outcome, url: &str) -> Result<FetchedPage, FetchError> {
        match outcome {
            Outcome::Html(html) => Ok(FetchedPage {
                final_url: url.to_string(),
                status: Some(200),
                html: html.clone(),
            }),
            Outcome::Redirected(target) => Ok(FetchedPage {
                final_url: target.clone(),
                status: Some(200),
                html: PAGE.to_string(),
            }),
            Outcome::Blocked => Err(FetchError::BotBlocked("cloudflare")),
            Outcome::Status(code) => Err(FetchError::Status(*code)),
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn method(&self) -> ScrapeMethod {
            self.method
        }

        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            respond(&self.outcome, url)
        }
    }

    struct FakeBrowser {
        outcome: Outcome,
        renders: AtomicUsize,
        closes: AtomicUsize,
    }

    impl FakeBrowser {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                renders: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeBrowser {
        fn method(&self) -> ScrapeMethod {
            ScrapeMethod::RenderedBrowser
        }

        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            respond(&self.outcome, url)
        }
    }

    #[async_trait]
    impl BrowserService for FakeBrowser {
        async fn open(&self) -> Result<(), FetchError> {
            Ok(())
        }

        async fn screenshot(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close_all(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    const PAGE: &str = "<html><head><title>Hi</title></head><body><p>Hello world</p></body></html>";

    #[tokio::test]
    async fn test_direct_http_wins() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Html(PAGE.to_string()));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct.clone(), None, browser.clone());

        let content = acquirer.acquire("https://example.org/", &AcquireOptions::default()).await;
        assert!(content.success);
        assert_eq!(content.method, Some(ScrapeMethod::DirectHttp));
        assert!(content.text.contains("Hello world"));
        assert_eq!(browser.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_browser_on_bot_block() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Blocked);
        let bypass = FakeTransport::new(ScrapeMethod::BypassProxy, Outcome::Status(500));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer =
            Acquirer::with_transports(FetchConfig::default(), direct.clone(), Some(bypass.clone()), browser.clone());

        let content = acquirer.acquire("https://example.org/", &AcquireOptions::default()).await;
        assert!(content.success);
        assert_eq!(content.method, Some(ScrapeMethod::RenderedBrowser));
        assert_eq!(direct.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bypass.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skip_flags() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Status(403));
        let bypass = FakeTransport::new(ScrapeMethod::BypassProxy, Outcome::Html(PAGE.to_string()));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer =
            Acquirer::with_transports(FetchConfig::default(), direct, Some(bypass.clone()), browser.clone());

        let options = AcquireOptions::default().without_bypass().without_render();
        let content = acquirer.acquire("https://example.org/", &options).await;
        assert!(!content.success);
        assert_eq!(bypass.calls.load(Ordering::SeqCst), 0);
        assert_eq!(browser.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preferred_method_first() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Html(PAGE.to_string()));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct.clone(), None, browser.clone());

        let options = AcquireOptions::default()
            .without_render()
            .with_preferred(ScrapeMethod::RenderedBrowser);
        let content = acquirer.acquire("https://example.org/", &options).await;
        assert_eq!(content.method, Some(ScrapeMethod::RenderedBrowser));
        assert_eq!(direct.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_methods_failed() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Status(404));
        let browser = FakeBrowser::new(Outcome::Blocked);
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct, None, browser);

        let content = acquirer.acquire("https://example.org/missing", &AcquireOptions::default()).await;
        assert!(!content.success);
        assert!(content.html.is_empty());
        let error = content.error.unwrap();
        assert!(error.starts_with("All acquisition methods failed"));
        assert!(error.contains("HTTP 404"));
        assert_eq!(content.method, Some(ScrapeMethod::RenderedBrowser));
    }

    #[tokio::test]
    async fn test_validation_is_terminal() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Html(PAGE.to_string()));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct.clone(), None, browser.clone());

        let content = acquirer.acquire("http://127.0.0.1/admin", &AcquireOptions::default()).await;
        assert!(!content.success);
        assert!(content.method.is_none());
        assert_eq!(direct.calls.load(Ordering::SeqCst), 0);
        assert_eq!(browser.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirect_to_private_host_is_terminal() {
        let direct = FakeTransport::new(
            ScrapeMethod::DirectHttp,
            Outcome::Redirected("http://169.254.169.254/latest/meta-data".to_string()),
        );
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct.clone(), None, browser.clone());

        let content = acquirer.acquire("https://example.org/", &AcquireOptions::default()).await;
        assert!(!content.success);
        assert!(content.html.is_empty());
        assert!(content.error.unwrap().contains("169.254.169.254"));
        assert_eq!(content.method, Some(ScrapeMethod::DirectHttp));
        assert_eq!(browser.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_public_redirect_accepted() {
        let direct = FakeTransport::new(
            ScrapeMethod::DirectHttp,
            Outcome::Redirected("https://www.example.org/home".to_string()),
        );
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct, None, browser);

        let content = acquirer.acquire("https://example.org/", &AcquireOptions::default()).await;
        assert!(content.success);
    }

    #[tokio::test]
    async fn test_close_browser() {
        let direct = FakeTransport::new(ScrapeMethod::DirectHttp, Outcome::Status(500));
        let browser = FakeBrowser::new(Outcome::Html(PAGE.to_string()));
        let acquirer = Acquirer::with_transports(FetchConfig::default(), direct, None, browser.clone());

        let png = acquirer.screenshot("https://example.org/").await.unwrap();
        assert_eq!(&png[1..4], b"PNG");
        acquirer.close_browser().await;
        assert_eq!(browser.closes.load(Ordering::SeqCst), 1);
    }
}
