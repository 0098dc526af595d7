//! Agent tool set: `scrape_url`, `crawl_links`, `complete`
//!
//! Tools mutate only the run's `ContentStore`. A URL already in the store
//! is never fetched again.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use scout_core::{truncate_chars, AcquiredContent, CrawlCandidate, ScrapeMethod};
use scout_fetch::{extract_links, AcquireOptions, LinkCrawler};

use crate::{AgentAction, PageSource};

/// Default and upper bound for `crawl_links`
pub const DEFAULT_CRAWL_PAGES: usize = 10;
const MAX_CRAWL_PAGES: usize = 50;

/// Errors reported back to the model; never fatal to the loop
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}' (available: scrape_url, crawl_links, complete)")]
    UnknownTool(String),

    #[error("Tool {tool} is missing parameter '{param}'")]
    MissingParam { tool: &'static str, param: &'static str },

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ScrapeUrl { url: String, method: Option<ScrapeMethod> },
    CrawlLinks { url: String, max_pages: usize },
    Complete { result: String },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ScrapeUrl { .. } => "scrape_url",
            ToolCall::CrawlLinks { .. } => "crawl_links",
            ToolCall::Complete { .. } => "complete",
        }
    }
}

impl TryFrom<&AgentAction> for ToolCall {
    type Error = ToolError;

    fn try_from(action: &AgentAction) -> Result<Self, Self::Error> {
        match action.tool.trim().to_lowercase().as_str() {
            "scrape_url" | "scrape" => {
                let url = action.str_param("url").ok_or(ToolError::MissingParam {
                    tool: "scrape_url",
                    param: "url",
                })?;
                // an unrecognized method falls back to the default chain
                let method = action.str_param("method").and_then(|m| m.parse().ok());
                Ok(ToolCall::ScrapeUrl {
                    url: url.trim().to_string(),
                    method,
                })
            }
            "crawl_links" | "crawl" => {
                let url = action.str_param("url").ok_or(ToolError::MissingParam {
                    tool: "crawl_links",
                    param: "url",
                })?;
                let max_pages = action
                    .params
                    .get("max_pages")
                    .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                    .map(|n| (n as usize).clamp(1, MAX_CRAWL_PAGES))
                    .unwrap_or(DEFAULT_CRAWL_PAGES);
                Ok(ToolCall::CrawlLinks {
                    url: url.trim().to_string(),
                    max_pages,
                })
            }
            "complete" | "finish" | "final_answer" => {
                let result = match action.params.get("result") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Ok(ToolCall::Complete { result })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// Key under which a URL is cached: no fragment, no trailing slash
pub fn content_key(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

/// Pages accumulated during one agent run, in acquisition order
#[derive(Debug, Default)]
pub struct ContentStore {
    pages: Vec<Arc<AcquiredContent>>,
    index: HashMap<String, usize>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successfully acquired page; an existing entry wins
    pub fn insert(&mut self, content: Arc<AcquiredContent>) -> Arc<AcquiredContent> {
        let key = content_key(&content.url);
        if let Some(&idx) = self.index.get(&key) {
            return Arc::clone(&self.pages[idx]);
        }
        self.index.insert(key, self.pages.len());
        self.pages.push(Arc::clone(&content));
        content
    }

    pub fn get(&self, url: &str) -> Option<Arc<AcquiredContent>> {
        self.index.get(&content_key(url)).map(|&idx| Arc::clone(&self.pages[idx]))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(&content_key(url))
    }

    /// URLs visited, in order
    pub fn sources(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.url.clone()).collect()
    }

    pub fn pages(&self) -> &[Arc<AcquiredContent>] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Where `crawl_links` found its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Crawler,
    PageLinks,
}

/// Result of executing one tool
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Scraped {
        content: Arc<AcquiredContent>,
        already_scraped: bool,
    },
    ScrapeFailed {
        url: String,
        error: String,
    },
    Links {
        url: String,
        source: LinkSource,
        links: Vec<CrawlCandidate>,
    },
    Complete {
        result: String,
    },
}

impl ToolOutcome {
    /// Observation text fed back to the model
    pub fn observation(&self, preview_chars: usize) -> String {
        match self {
            ToolOutcome::Scraped {
                content,
                already_scraped: true,
            } => format!(
                "Already scraped {} (not fetched again). Content:\n{}",
                content.url,
                content.preview(preview_chars)
            ),
            ToolOutcome::Scraped { content, .. } => format!(
                "Scraped {} via {} ({} chars):\n{}",
                content.url,
                content.method.map(|m| m.as_str()).unwrap_or("unknown"),
                content.text.chars().count(),
                content.preview(preview_chars)
            ),
            ToolOutcome::ScrapeFailed { url, error } => format!("Failed to scrape {}: {}", url, error),
            ToolOutcome::Links { url, source, links } => {
                if links.is_empty() {
                    return format!("No internal links found on {}", url);
                }
                let origin = match source {
                    LinkSource::Crawler => "crawler",
                    LinkSource::PageLinks => "page links",
                };
                let mut out = format!("Found {} links from {} ({}):\n", links.len(), url, origin);
                for link in links {
                    match &link.title {
                        Some(title) => out.push_str(&format!("- {} | {}\n", link.url, truncate_chars(title, 80))),
                        None => out.push_str(&format!("- {}\n", link.url)),
                    }
                }
                out
            }
            ToolOutcome::Complete { result } => format!("Completed: {}", truncate_chars(result, preview_chars)),
        }
    }
}

/// Tool executor bound to a page source and an optional crawler
pub struct AgentTools {
    source: Arc<dyn PageSource>,
    crawler: Option<Arc<dyn LinkCrawler>>,
    options: AcquireOptions,
}

impl AgentTools {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            crawler: None,
            options: AcquireOptions::default(),
        }
    }

    pub fn with_crawler(mut self, crawler: Arc<dyn LinkCrawler>) -> Self {
        self.crawler = Some(crawler);
        self
    }

    /// Base options for tool acquisitions (bypass proxy, skip flags)
    pub fn with_options(mut self, options: AcquireOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn execute(&self, call: &ToolCall, store: &mut ContentStore) -> Result<ToolOutcome, ToolError> {
        match call {
            ToolCall::ScrapeUrl { url, method } => Ok(self.scrape_url(url, *method, store).await),
            ToolCall::CrawlLinks { url, max_pages } => self.crawl_links(url, *max_pages, store).await,
            ToolCall::Complete { result } => Ok(ToolOutcome::Complete { result: result.clone() }),
        }
    }

    /// Fetch a page unless the run already has it
    pub async fn scrape_url(&self, url: &str, method: Option<ScrapeMethod>, store: &mut ContentStore) -> ToolOutcome {
        if let Some(content) = store.get(url) {
            debug!("scrape_url cache hit for {}", url);
            return ToolOutcome::Scraped {
                content,
                already_scraped: true,
            };
        }

        let mut options = self.options.clone();
        options.preferred_method = Some(method.unwrap_or(ScrapeMethod::DirectHttp));

        let content = self.source.acquire(url, &options).await;
        if !content.success {
            return ToolOutcome::ScrapeFailed {
                url: url.to_string(),
                error: content.error.unwrap_or_else(|| "unknown error".to_string()),
            };
        }

        info!("Agent scraped {} ({} chars)", url, content.text.len());
        ToolOutcome::Scraped {
            content: store.insert(Arc::new(content)),
            already_scraped: false,
        }
    }

    /// Discover candidate URLs without scraping them
    pub async fn crawl_links(
        &self,
        url: &str,
        max_pages: usize,
        store: &mut ContentStore,
    ) -> Result<ToolOutcome, ToolError> {
        if let Some(crawler) = &self.crawler {
            match crawler.crawl(url, max_pages).await {
                Ok(links) if !links.is_empty() => {
                    return Ok(ToolOutcome::Links {
                        url: url.to_string(),
                        source: LinkSource::Crawler,
                        links,
                    })
                }
                Ok(_) => debug!("Crawler found nothing for {}, using page links", url),
                Err(e) => warn!("Crawler failed for {}: {}, using page links", url, e),
            }
        }

        let page = match store.get(url) {
            Some(page) => page,
            None => match self.scrape_url(url, None, store).await {
                ToolOutcome::Scraped { content, .. } => content,
                ToolOutcome::ScrapeFailed { error, .. } => return Err(ToolError::Fetch(error)),
                _ => return Err(ToolError::Fetch(format!("could not load {}", url))),
            },
        };

        let base = Url::parse(&page.url).map_err(|e| ToolError::Fetch(e.to_string()))?;
        let mut links = extract_links(&page.html, &base);
        links.truncate(max_pages);

        Ok(ToolOutcome::Links {
            url: url.to_string(),
            source: LinkSource::PageLinks,
            links,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use scout_fetch::FetchError;

    /// Serves canned pages by URL and counts acquisitions
    pub(crate) struct FakeSource {
        pages: HashMap<String, String>,
        pub(crate) calls: AtomicUsize,
        pub(crate) methods: Mutex<Vec<Option<ScrapeMethod>>>,
    }

    impl FakeSource {
        pub(crate) fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (content_key(url), html.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
                methods: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn acquire(&self, url: &str, options: &AcquireOptions) -> AcquiredContent {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.methods.lock().unwrap().push(options.preferred_method);
            match self.pages.get(&content_key(url)) {
                Some(html) => {
                    let text = scout_fetch::extract_content(html).text;
                    AcquiredContent::succeeded(url, html.clone(), text, ScrapeMethod::DirectHttp, 5)
                }
                None => AcquiredContent::failed(url, "All acquisition methods failed (direct-http: HTTP 404)", 5),
            }
        }
    }

    struct FailingCrawler;

    #[async_trait]
    impl LinkCrawler for FailingCrawler {
        async fn crawl(&self, _seed_url: &str, _max_pages: usize) -> Result<Vec<CrawlCandidate>, FetchError> {
            Err(FetchError::Crawler("HTTP 502".to_string()))
        }
    }

    struct StaticCrawler;

    #[async_trait]
    impl LinkCrawler for StaticCrawler {
        async fn crawl(&self, _seed_url: &str, max_pages: usize) -> Result<Vec<CrawlCandidate>, FetchError> {
            Ok(vec![CrawlCandidate::new("https://a.com/team").with_title("Team")]
                .into_iter()
                .take(max_pages)
                .collect())
        }
    }

    const HOME: &str = r#"<html><body><a href="/about">About</a><a href="/contact">Contact</a>
        <a href="https://other.org/x">Elsewhere</a></body></html>"#;

    #[test]
    fn test_tool_call_parsing() {
        let action = AgentAction::new("scrape_url")
            .with_param("url", "https://a.com/x")
            .with_param("method", "browser");
        assert_eq!(
            ToolCall::try_from(&action).unwrap(),
            ToolCall::ScrapeUrl {
                url: "https://a.com/x".to_string(),
                method: Some(ScrapeMethod::RenderedBrowser)
            }
        );

        let crawl = AgentAction::new("crawl_links").with_param("url", "https://a.com");
        assert!(matches!(
            ToolCall::try_from(&crawl).unwrap(),
            ToolCall::CrawlLinks { max_pages: DEFAULT_CRAWL_PAGES, .. }
        ));

        let missing = AgentAction::new("scrape_url");
        assert!(matches!(ToolCall::try_from(&missing), Err(ToolError::MissingParam { .. })));

        let unknown = AgentAction::new("send_email");
        assert!(matches!(ToolCall::try_from(&unknown), Err(ToolError::UnknownTool(t)) if t == "send_email"));

        let empty = AgentAction::new("complete");
        assert_eq!(ToolCall::try_from(&empty).unwrap(), ToolCall::Complete { result: String::new() });
    }

    #[tokio::test]
    async fn test_scrape_is_idempotent() {
        let source = FakeSource::new(&[("https://a.com/about", "<p>About us</p>")]);
        let tools = AgentTools::new(source.clone());
        let mut store = ContentStore::new();

        let first = tools.scrape_url("https://a.com/about", None, &mut store).await;
        assert!(matches!(first, ToolOutcome::Scraped { already_scraped: false, .. }));

        let second = tools.scrape_url("https://a.com/about/", None, &mut store).await;
        assert!(matches!(second, ToolOutcome::Scraped { already_scraped: true, .. }));
        assert!(second.observation(100).starts_with("Already scraped"));

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.sources(), vec!["https://a.com/about"]);
        assert_eq!(source.methods.lock().unwrap()[0], Some(ScrapeMethod::DirectHttp));
    }

    #[tokio::test]
    async fn test_scrape_failure_not_stored() {
        let tools = AgentTools::new(FakeSource::new(&[]));
        let mut store = ContentStore::new();
        let outcome = tools.scrape_url("https://a.com/missing", None, &mut store).await;
        assert!(matches!(outcome, ToolOutcome::ScrapeFailed { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_crawl_falls_back_to_page_links() {
        let source = FakeSource::new(&[("https://a.com/", HOME)]);
        let tools = AgentTools::new(source.clone()).with_crawler(Arc::new(FailingCrawler));
        let mut store = ContentStore::new();

        let outcome = tools.crawl_links("https://a.com/", 10, &mut store).await.unwrap();
        let ToolOutcome::Links { source: origin, links, .. } = outcome else {
            panic!("expected links");
        };
        assert_eq!(origin, LinkSource::PageLinks);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/about", "https://a.com/contact"]);
        // the seed page is now part of the run
        assert!(store.contains("https://a.com"));

        // a second crawl reuses the stored page
        tools.crawl_links("https://a.com/", 1, &mut store).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_crawler_preferred() {
        let source = FakeSource::new(&[]);
        let tools = AgentTools::new(source.clone()).with_crawler(Arc::new(StaticCrawler));
        let mut store = ContentStore::new();
        let outcome = tools.crawl_links("https://a.com/", 5, &mut store).await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Links { source: LinkSource::Crawler, .. }));
        assert!(outcome.observation(100).contains("https://a.com/team | Team"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_crawl_unreachable_page_is_tool_error() {
        let tools = AgentTools::new(FakeSource::new(&[]));
        let mut store = ContentStore::new();
        let result = tools.crawl_links("https://a.com/", 5, &mut store).await;
        assert!(matches!(result, Err(ToolError::Fetch(_))));
    }
}
