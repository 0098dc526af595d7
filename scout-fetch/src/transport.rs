//! Fetch transports: direct HTTP and the anti-bot bypass proxy
//!
//! Each transport returns raw markup or a `FetchError`. Non-2xx statuses,
//! non-HTML bodies, empty bodies and bot-block pages are all errors so the
//! acquisition chain moves on to the next method.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use scout_core::ScrapeMethod;

use crate::{create_http_client, request_error, FetchConfig, FetchError, UrlGuard};

/// Raw page returned by a transport
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,
    pub status: Option<u16>,
    pub html: String,
}

/// Uniform "fetch a URL" capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which acquisition method this transport implements
    fn method(&self) -> ScrapeMethod;

    /// Fetch a page
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Signatures of interstitial/challenge pages (matched lowercase)
const BOT_BLOCK_SIGNATURES: &[(&str, &str)] = &[
    ("cf-browser-verification", "cloudflare"),
    ("<title>just a moment...</title>", "cloudflare"),
    ("attention required! | cloudflare", "cloudflare"),
    ("checking your browser before accessing", "cloudflare"),
    ("enable javascript and cookies to continue", "cloudflare"),
    ("px-captcha", "perimeterx"),
    ("_incapsula_resource", "incapsula"),
    ("request unsuccessful. incapsula", "incapsula"),
    ("distil_r_captcha", "distil"),
    ("captcha-delivery.com", "datadome"),
    ("<title>access denied</title>", "akamai"),
    ("are you a robot", "captcha"),
    ("g-recaptcha", "recaptcha"),
];

/// Pages larger than this are real content even if they embed a captcha widget
const BLOCK_PAGE_MAX_BYTES: usize = 64 * 1024;

/// Detect a bot-block page; returns the vendor name
pub fn detect_bot_block(html: &str) -> Option<&'static str> {
    if html.len() > BLOCK_PAGE_MAX_BYTES {
        return None;
    }
    let lower = html.to_lowercase();
    BOT_BLOCK_SIGNATURES
        .iter()
        .find(|(sig, _)| lower.contains(sig))
        .map(|(_, vendor)| *vendor)
}

/// Shared body checks for HTTP-level transports
fn check_body(mut html: String, max_bytes: usize) -> Result<String, FetchError> {
    if html.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }
    if let Some(vendor) = detect_bot_block(&html) {
        return Err(FetchError::BotBlocked(vendor));
    }
    if html.len() > max_bytes {
        let mut cut = max_bytes;
        while !html.is_char_boundary(cut) {
            cut -= 1;
        }
        html.truncate(cut);
    }
    Ok(html)
}

fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml") || ct.contains("text/plain")
}

/// Plain HTTP GET transport
pub struct HttpTransport {
    client: Client,
    max_body_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_http_client(config.http_timeout_secs, UrlGuard::new(config.allow_private_hosts))?,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::DirectHttp
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!("HTTP GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(ct) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html_content_type(ct) {
                return Err(FetchError::ContentType(ct.to_string()));
            }
        }

        let final_url = response.url().to_string();
        let html = check_body(response.text().await?, self.max_body_bytes)?;

        Ok(FetchedPage {
            final_url,
            status: Some(status.as_u16()),
            html,
        })
    }
}

/// Request body for a FlareSolverr-compatible proxy
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolverRequest<'a> {
    cmd: &'static str,
    url: &'a str,
    max_timeout: u64,
}

/// Response of a FlareSolverr-compatible proxy
#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<SolverSolution>,
}

#[derive(Debug, Deserialize)]
struct SolverSolution {
    url: String,
    status: u16,
    #[serde(default)]
    response: String,
}

/// Anti-bot bypass transport speaking the FlareSolverr `request.get` API
pub struct BypassTransport {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
    max_body_bytes: usize,
}

impl BypassTransport {
    pub fn new(proxy_url: &str, config: &FetchConfig) -> Result<Self, FetchError> {
        // Leave headroom over the solver's own timeout
        let client = Client::builder()
            .timeout(Duration::from_secs(config.bypass_timeout_secs + 5))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: solver_endpoint(proxy_url),
            timeout_secs: config.bypass_timeout_secs,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

fn solver_endpoint(proxy_url: &str) -> String {
    let trimmed = proxy_url.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

#[async_trait]
impl Transport for BypassTransport {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::BypassProxy
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!("Bypass proxy {} -> {}", self.endpoint, url);

        let request = SolverRequest {
            cmd: "request.get",
            url,
            max_timeout: self.timeout_secs * 1000,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Bypass(format!("proxy returned HTTP {}", response.status())));
        }

        let parsed: SolverResponse = response.json().await?;
        if parsed.status != "ok" {
            return Err(FetchError::Bypass(format!("{}: {}", parsed.status, parsed.message)));
        }
        let solution = parsed
            .solution
            .ok_or_else(|| FetchError::Bypass("response has no solution".to_string()))?;

        if !(200..300).contains(&solution.status) {
            return Err(FetchError::Status(solution.status));
        }

        let html = check_body(solution.response, self.max_body_bytes)?;
        Ok(FetchedPage {
            final_url: solution.url,
            status: Some(solution.status),
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_bot_block() {
        let challenge = "<html><head><title>Just a moment...</title></head><body></body></html>";
        assert_eq!(detect_bot_block(challenge), Some("cloudflare"));
        assert_eq!(detect_bot_block("<html><body>Welcome</body></html>"), None);
    }

    #[test]
    fn test_large_pages_not_flagged() {
        let mut big = String::from("<div class=\"g-recaptcha\"></div>");
        big.push_str(&"<p>real content</p>".repeat(5000));
        assert_eq!(detect_bot_block(&big), None);
    }

    #[test]
    fn test_check_body() {
        assert!(matches!(check_body("   ".to_string(), 100), Err(FetchError::EmptyBody)));
        assert!(matches!(
            check_body("<p>are you a robot?</p>".to_string(), 100),
            Err(FetchError::BotBlocked("captcha"))
        ));
        assert_eq!(check_body("<p>héllo</p>".to_string(), 5).unwrap(), "<p>h");
    }

    #[test]
    fn test_content_types() {
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("image/png"));
    }

    #[test]
    fn test_solver_endpoint() {
        assert_eq!(solver_endpoint("http://solver:8191"), "http://solver:8191/v1");
        assert_eq!(solver_endpoint("http://solver:8191/v1/"), "http://solver:8191/v1");
    }

    #[test]
    fn test_solver_response_schema() {
        let body = r#"{"status":"ok","message":"","solution":{"url":"https://a.com/","status":200,"response":"<html>ok</html>","cookies":[]}}"#;
        let parsed: SolverResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "ok");
        assert_eq!(parsed.solution.unwrap().response, "<html>ok</html>");
    }
}
