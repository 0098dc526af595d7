//! HTTP client construction and transport configuration

use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::guard::UrlGuard;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Direct HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Anti-bot bypass proxy timeout in seconds
    pub bypass_timeout_secs: u64,
    /// Headless browser navigation timeout in seconds
    pub browser_timeout_secs: u64,
    /// Bypass proxy endpoint (FlareSolverr-compatible), if any
    pub bypass_proxy_url: Option<String>,
    /// Path to a Chrome/Chromium binary (autodetected when unset)
    pub chrome_executable: Option<String>,
    /// Wait after navigation so client-side rendering settles
    pub render_settle_ms: u64,
    /// Bodies larger than this are truncated
    pub max_body_bytes: usize,
    /// Permit loopback/private hosts (tests and intranet use)
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 15,
            bypass_timeout_secs: 60,
            browser_timeout_secs: 45,
            bypass_proxy_url: None,
            chrome_executable: None,
            render_settle_ms: 1500,
            max_body_bytes: 5 * 1024 * 1024,
            allow_private_hosts: false,
        }
    }
}

impl FetchConfig {
    pub fn with_bypass_proxy(mut self, url: &str) -> Self {
        self.bypass_proxy_url = Some(url.to_string());
        self
    }

    pub fn with_http_timeout(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_browser_timeout(mut self, secs: u64) -> Self {
        self.browser_timeout_secs = secs;
        self
    }

    pub fn with_chrome_executable(mut self, path: &str) -> Self {
        self.chrome_executable = Some(path.to_string());
        self
    }
}

/// Errors from acquisition transports
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Blocked URL: {0}")]
    Blocked(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Unsupported content type: {0}")]
    ContentType(String),

    #[error("Bot protection detected ({0})")]
    BotBlocked(&'static str),

    #[error("Empty response body")]
    EmptyBody,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("More than {0} redirects")]
    TooManyRedirects(usize),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Bypass proxy error: {0}")]
    Bypass(String),

    #[error("Crawler error: {0}")]
    Crawler(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Validation failures end the acquisition without trying other methods
    pub fn is_validation(&self) -> bool {
        matches!(self, FetchError::InvalidUrl(_) | FetchError::Blocked(_))
    }
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

pub const MAX_REDIRECTS: usize = 10;

/// Decide whether to follow a redirect to `next` after `hops` earlier ones
pub fn check_redirect(guard: &UrlGuard, next: &Url, hops: usize) -> Result<(), FetchError> {
    if hops >= MAX_REDIRECTS {
        return Err(FetchError::TooManyRedirects(MAX_REDIRECTS));
    }
    guard.check(next.as_str()).map(|_| ())
}

/// Redirect policy that re-applies the URL guard on every hop
pub fn guarded_redirects(guard: UrlGuard) -> Policy {
    Policy::custom(move |attempt| match check_redirect(&guard, attempt.url(), attempt.previous().len()) {
        Ok(()) => attempt.follow(),
        Err(e) => attempt.error(e),
    })
}

/// Create an HTTP client with the given timeout and a rotated user agent.
/// Redirects are only followed to URLs the guard accepts.
pub fn create_http_client(timeout_secs: u64, guard: UrlGuard) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .user_agent(random_user_agent())
        .redirect(guarded_redirects(guard))
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}

/// Map a reqwest error, surfacing a guard rejection raised by the redirect policy
pub fn request_error(error: reqwest::Error) -> FetchError {
    let mut source = std::error::Error::source(&error);
    while let Some(inner) = source {
        if let Some(FetchError::Blocked(reason) | FetchError::InvalidUrl(reason)) = inner.downcast_ref::<FetchError>() {
            return FetchError::Blocked(format!("redirect to {}", reason));
        }
        source = inner.source();
    }
    FetchError::Request(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert!(config.http_timeout_secs < config.bypass_timeout_secs);
        assert!(config.bypass_proxy_url.is_none());
        assert!(!config.allow_private_hosts);
    }

    #[test]
    fn test_random_user_agent() {
        let ua = random_user_agent();
        assert!(ua.contains("Mozilla"));
    }

    #[test]
    fn test_redirect_hops_are_guarded() {
        let guard = UrlGuard::default();
        let public = Url::parse("https://www.example.org/contact").unwrap();
        let metadata = Url::parse("http://169.254.169.254/latest/meta-data").unwrap();
        let loopback = Url::parse("http://127.0.0.1:8080/admin").unwrap();

        assert!(check_redirect(&guard, &public, 0).is_ok());
        assert!(matches!(check_redirect(&guard, &metadata, 1), Err(FetchError::Blocked(_))));
        assert!(matches!(check_redirect(&guard, &loopback, 0), Err(FetchError::Blocked(_))));
        assert!(matches!(
            check_redirect(&guard, &public, MAX_REDIRECTS),
            Err(FetchError::TooManyRedirects(_))
        ));
        assert!(check_redirect(&UrlGuard::new(true), &loopback, 0).is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert!(FetchError::Blocked("localhost".to_string()).is_validation());
        assert!(!FetchError::Status(503).is_validation());
    }
}
