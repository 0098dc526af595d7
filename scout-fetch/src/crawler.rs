//! External crawler client
//!
//! Talks to a link-discovery service and normalizes its responses into
//! crawl candidates on the seed's registrable domain.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use scout_core::CrawlCandidate;

use crate::guard::same_site;
use crate::FetchError;

/// Link discovery capability
#[async_trait]
pub trait LinkCrawler: Send + Sync {
    /// Discover up to `max_pages` URLs reachable from `seed_url`
    async fn crawl(&self, seed_url: &str, max_pages: usize) -> Result<Vec<CrawlCandidate>, FetchError>;
}

/// Crawler service configuration
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Service base URL; the client posts to `{base_url}/crawl`
    pub base_url: String,
    /// Bearer token, if the service needs one
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

/// HTTP client for a crawl service
pub struct HttpCrawler {
    client: Client,
    config: CrawlerConfig,
}

impl HttpCrawler {
    pub fn new(config: CrawlerConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LinkCrawler for HttpCrawler {
    async fn crawl(&self, seed_url: &str, max_pages: usize) -> Result<Vec<CrawlCandidate>, FetchError> {
        let endpoint = format!("{}/crawl", self.config.base_url);
        debug!("Crawler {} seed={} max={}", endpoint, seed_url, max_pages);

        let body = serde_json::json!({
            "url": seed_url,
            "max_pages": max_pages,
            "limit": max_pages,
        });

        let mut request = self.client.post(&endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Crawler(format!("HTTP {}", response.status())));
        }

        let text = response.text().await?;
        let seed = Url::parse(seed_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let mut candidates = normalize_crawl_response(&text, &seed);
        candidates.truncate(max_pages);

        if candidates.is_empty() {
            warn!("Crawler returned no usable pages for {}", seed_url);
        }
        Ok(candidates)
    }
}

fn str_at<'a>(item: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|path| {
        let mut cursor = item;
        for key in *path {
            cursor = cursor.get(*key)?;
        }
        cursor.as_str().filter(|s| !s.trim().is_empty())
    })
}

fn item_to_candidate(item: &Value) -> Option<CrawlCandidate> {
    if let Some(url) = item.as_str() {
        return Some(CrawlCandidate::new(url));
    }
    let url = str_at(item, &[&["url"], &["sourceURL"], &["metadata", "sourceURL"], &["metadata", "url"], &["link"]])?;
    let mut candidate = CrawlCandidate::new(url);
    if let Some(title) = str_at(item, &[&["title"], &["metadata", "title"]]) {
        candidate = candidate.with_title(title);
    }
    if let Some(snippet) = str_at(
        item,
        &[&["snippet"], &["description"], &["metadata", "description"], &["markdown"], &["text"]],
    ) {
        candidate = candidate.with_snippet(snippet.chars().take(300).collect::<String>());
    }
    Some(candidate)
}

/// Normalize every known crawler response shape into candidates
///
/// Accepted shapes:
/// - `{"results": [...]}` / `{"data": [...]}` / `{"pages": [...]}` / `{"links": [...]}`
/// - a bare JSON array of items or URL strings
/// - newline-delimited JSON, one item per line (streamed responses)
///
/// Items carry the URL at `url`, `sourceURL` or `metadata.sourceURL`, and
/// optional `title`/`metadata.title` and `snippet`/`description`/`markdown`.
/// Results are restricted to the seed's registrable domain and deduplicated.
pub fn normalize_crawl_response(body: &str, seed: &Url) -> Vec<CrawlCandidate> {
    let items: Vec<Value> = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(map)) => ["results", "data", "pages", "links"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array).cloned())
            .unwrap_or_default(),
        Ok(_) => Vec::new(),
        Err(_) => body
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .collect(),
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(item_to_candidate)
        .filter(|c| {
            Url::parse(&c.url)
                .map(|u| same_site(seed, &u) && u.as_str().trim_end_matches('/') != seed.as_str().trim_end_matches('/'))
                .unwrap_or(false)
        })
        .filter(|c| seen.insert(c.url.trim_end_matches('/').to_string()))
        .collect()
}
