//! Multi-page discovery
//!
//! Contact, product and asset harvesting across a site. Each operation
//! visits the seed page first, then a bounded list of candidate pages; the
//! number of pages inspected and results kept are always capped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use scout_agents::PageSource;
use scout_core::{
    detect_intent, extract_emails, extract_phones, keywords_for, rank_candidates, AcquiredContent, CrawlCandidate,
    ProductSummary, TaskIntent,
};
use scout_fetch::{extract_assets, extract_links, extract_products, AcquireOptions, AssetKind, AssetLink, LinkCrawler};

/// Conventional contact page paths, tried before crawling
pub const PROBABLE_CONTACT_PATHS: &[&str] = &[
    "/contact",
    "/contact-us",
    "/about",
    "/about-us",
    "/support",
    "/help",
    "/impressum",
    "/team",
];

/// Upper bounds for one discovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryLimits {
    /// Pages fetched, seed included
    pub max_pages: usize,
    /// Results kept per kind
    pub max_results: usize,
    /// Crawl candidates considered after ranking
    pub max_candidates: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_pages: 8,
            max_results: 100,
            max_candidates: 30,
        }
    }
}

impl DiscoveryLimits {
    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = n.max(1);
        self
    }

    pub fn with_max_results(mut self, n: usize) -> Self {
        self.max_results = n.max(1);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub limits: DiscoveryLimits,
    pub acquire: AcquireOptions,
}

/// Accumulated findings of a discovery run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub url: String,
    pub task: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetLink>,
    /// Pages successfully acquired, in visit order
    pub pages_visited: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiscoveryReport {
    fn new(url: &str, task: &str) -> Self {
        Self {
            url: url.to_string(),
            task: task.to_string(),
            ..Default::default()
        }
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

fn page_key(url: &str) -> String {
    let mut key = url.trim().to_string();
    if let Some(idx) = key.find('#') {
        key.truncate(idx);
    }
    key.trim_end_matches('/').to_string()
}

/// Bounded page visitor shared by the discovery operations
struct Visitor<'a> {
    source: &'a dyn PageSource,
    options: &'a DiscoveryOptions,
    seen: HashSet<String>,
    attempts: usize,
    visited: Vec<String>,
}

impl<'a> Visitor<'a> {
    fn new(source: &'a dyn PageSource, options: &'a DiscoveryOptions) -> Self {
        Self {
            source,
            options,
            seen: HashSet::new(),
            attempts: 0,
            visited: Vec::new(),
        }
    }

    fn exhausted(&self) -> bool {
        self.attempts >= self.options.limits.max_pages
    }

    /// Acquire `url` unless it was seen already or the page budget is spent
    async fn visit(&mut self, url: &str) -> Option<AcquiredContent> {
        if self.exhausted() || !self.seen.insert(page_key(url)) {
            return None;
        }
        self.attempts += 1;

        let content = self.source.acquire(url, &self.options.acquire).await;
        if content.success {
            self.visited.push(content.url.clone());
            Some(content)
        } else {
            debug!("Discovery skipped {}: {}", url, content.error.as_deref().unwrap_or("unknown error"));
            None
        }
    }
}

/// Ranked candidate pages: the crawler when available, else the seed's own links
async fn candidates(
    crawler: Option<&dyn LinkCrawler>,
    seed: &Url,
    seed_html: Option<&str>,
    keywords: &[String],
    limit: usize,
) -> Vec<CrawlCandidate> {
    let mut found = Vec::new();
    if let Some(crawler) = crawler {
        match crawler.crawl(seed.as_str(), limit).await {
            Ok(links) => found = links,
            Err(e) => warn!("Crawler failed for {}: {}, using page links", seed, e),
        }
    }
    if found.is_empty() {
        if let Some(html) = seed_html {
            found = extract_links(html, seed);
        }
    }

    rank_candidates(found, keywords, limit)
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .map(|(candidate, _)| candidate)
        .collect()
}

fn push_unique(into: &mut Vec<String>, items: Vec<String>, cap: usize) {
    for item in items {
        if into.len() >= cap {
            break;
        }
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

fn collect_products(report: &mut DiscoveryReport, seen: &mut HashSet<String>, page: &AcquiredContent, cap: usize) {
    let Ok(base) = Url::parse(&page.url) else {
        return;
    };
    for product in extract_products(&page.html, &base) {
        if report.products.len() >= cap {
            break;
        }
        if seen.insert(page_key(&product.url)) {
            report.products.push(product);
        }
    }
}

fn collect_assets(
    report: &mut DiscoveryReport,
    seen: &mut HashSet<String>,
    page: &AcquiredContent,
    kinds: &[AssetKind],
    cap: usize,
) {
    let Ok(base) = Url::parse(&page.url) else {
        return;
    };
    for asset in extract_assets(&page.html, &base, kinds) {
        if report.assets.len() >= cap {
            break;
        }
        if seen.insert(asset.url.clone()) {
            report.assets.push(asset);
        }
    }
}

fn parse_seed(url: &str) -> Result<Url, String> {
    Url::parse(url.trim()).map_err(|e| format!("Invalid URL '{}': {}", url, e))
}

/// Walk the seed page, then conventional contact paths, then scored
/// candidates, until the requested contact data is found
pub async fn discover_contacts(
    source: &dyn PageSource,
    crawler: Option<&dyn LinkCrawler>,
    url: &str,
    task: &str,
    options: &DiscoveryOptions,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::new(url, task);
    let seed = match parse_seed(url) {
        Ok(seed) => seed,
        Err(e) => return report.fail(e),
    };

    let mut intent = detect_intent(task);
    if !intent.wants_contact() {
        intent.wants_email = true;
        intent.wants_phone = true;
    }
    let cap = options.limits.max_results;

    let satisfied = |r: &DiscoveryReport| {
        (!intent.wants_email || !r.emails.is_empty()) && (!intent.wants_phone || !r.phones.is_empty())
    };
    let harvest = |r: &mut DiscoveryReport, page: &AcquiredContent| {
        if intent.wants_email {
            push_unique(&mut r.emails, extract_emails(&page.html, &page.text), cap);
        }
        if intent.wants_phone {
            push_unique(&mut r.phones, extract_phones(&page.html, &page.text), cap);
        }
    };

    let mut visitor = Visitor::new(source, options);
    let seed_page = visitor.visit(seed.as_str()).await;
    if let Some(page) = &seed_page {
        harvest(&mut report, page);
    }

    if !satisfied(&report) {
        for path in PROBABLE_CONTACT_PATHS {
            if satisfied(&report) || visitor.exhausted() {
                break;
            }
            let Ok(target) = seed.join(path) else {
                continue;
            };
            if let Some(page) = visitor.visit(target.as_str()).await {
                harvest(&mut report, &page);
            }
        }
    }

    if !satisfied(&report) && !visitor.exhausted() {
        let keywords = keywords_for(&intent, task);
        let html = seed_page.as_ref().map(|p| p.html.as_str());
        for candidate in candidates(crawler, &seed, html, &keywords, options.limits.max_candidates).await {
            if satisfied(&report) || visitor.exhausted() {
                break;
            }
            if let Some(page) = visitor.visit(&candidate.url).await {
                harvest(&mut report, &page);
            }
        }
    }

    report.pages_visited = visitor.visited;
    report.success = !report.emails.is_empty() || !report.phones.is_empty();
    info!(
        "Contact discovery on {}: {} email(s), {} phone(s) across {} page(s)",
        url,
        report.emails.len(),
        report.phones.len(),
        report.pages_visited.len()
    );

    if report.success {
        report
    } else {
        let pages = report.pages_visited.len();
        report.fail(format!("No contact details found across {} page(s)", pages))
    }
}

/// Collect product cards from the seed page and its best listing candidates
pub async fn discover_products(
    source: &dyn PageSource,
    crawler: Option<&dyn LinkCrawler>,
    url: &str,
    task: &str,
    options: &DiscoveryOptions,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::new(url, task);
    let seed = match parse_seed(url) {
        Ok(seed) => seed,
        Err(e) => return report.fail(e),
    };

    let mut intent = detect_intent(task);
    intent.wants_product_list = true;
    let cap = options.limits.max_results;
    let mut seen_products = HashSet::new();

    let mut visitor = Visitor::new(source, options);
    let seed_page = visitor.visit(seed.as_str()).await;
    if let Some(page) = &seed_page {
        collect_products(&mut report, &mut seen_products, page, cap);
    }

    let keywords = keywords_for(&intent, task);
    let html = seed_page.as_ref().map(|p| p.html.as_str());
    for candidate in candidates(crawler, &seed, html, &keywords, options.limits.max_candidates).await {
        if report.products.len() >= cap || visitor.exhausted() {
            break;
        }
        // product detail pages are already captured as cards
        if seen_products.contains(&page_key(&candidate.url)) {
            continue;
        }
        if let Some(page) = visitor.visit(&candidate.url).await {
            collect_products(&mut report, &mut seen_products, &page, cap);
        }
    }

    report.pages_visited = visitor.visited;
    report.success = !report.products.is_empty();
    info!(
        "Product discovery on {}: {} product(s) across {} page(s)",
        url,
        report.products.len(),
        report.pages_visited.len()
    );

    if report.success {
        report
    } else {
        let pages = report.pages_visited.len();
        report.fail(format!("No products found across {} page(s)", pages))
    }
}

/// Asset kinds a task asks for; all kinds when it names none
pub fn asset_kinds(intent: &TaskIntent) -> Vec<AssetKind> {
    let mut kinds = Vec::new();
    if intent.wants_pdf {
        kinds.push(AssetKind::Pdf);
    }
    if intent.wants_images {
        kinds.push(AssetKind::Image);
    }
    if intent.wants_csv {
        kinds.push(AssetKind::Csv);
    }
    if kinds.is_empty() {
        kinds = vec![AssetKind::Pdf, AssetKind::Image, AssetKind::Csv];
    }
    kinds
}

/// Collect downloadable file links from the seed page and its best candidates
pub async fn harvest_assets(
    source: &dyn PageSource,
    crawler: Option<&dyn LinkCrawler>,
    url: &str,
    task: &str,
    options: &DiscoveryOptions,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::new(url, task);
    let seed = match parse_seed(url) {
        Ok(seed) => seed,
        Err(e) => return report.fail(e),
    };

    let intent = detect_intent(task);
    let kinds = asset_kinds(&intent);
    let cap = options.limits.max_results;
    let mut seen_assets = HashSet::new();

    let mut visitor = Visitor::new(source, options);
    let seed_page = visitor.visit(seed.as_str()).await;
    if let Some(page) = &seed_page {
        collect_assets(&mut report, &mut seen_assets, page, &kinds, cap);
    }

    let keywords = keywords_for(&intent, task);
    let html = seed_page.as_ref().map(|p| p.html.as_str());
    for candidate in candidates(crawler, &seed, html, &keywords, options.limits.max_candidates).await {
        if report.assets.len() >= cap || visitor.exhausted() {
            break;
        }
        if let Some(page) = visitor.visit(&candidate.url).await {
            collect_assets(&mut report, &mut seen_assets, &page, &kinds, cap);
        }
    }

    report.pages_visited = visitor.visited;
    report.success = !report.assets.is_empty();
    info!(
        "Asset harvest on {}: {} asset(s) across {} page(s)",
        url,
        report.assets.len(),
        report.pages_visited.len()
    );

    if report.success {
        report
    } else {
        let pages = report.pages_visited.len();
        report.fail(format!("No matching assets found across {} page(s)", pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_core::ScrapeMethod;
    use scout_fetch::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct SitePages {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl SitePages {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (page_key(u), h.to_string())).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for SitePages {
        async fn acquire(&self, url: &str, _options: &AcquireOptions) -> AcquiredContent {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(&page_key(url)) {
                Some(html) => {
                    AcquiredContent::succeeded(url, html.clone(), html.clone(), ScrapeMethod::DirectHttp, 1)
                }
                None => AcquiredContent::failed(url, "direct-http: HTTP 404", 1),
            }
        }
    }

    struct StaticCrawler(Vec<CrawlCandidate>);

    #[async_trait]
    impl LinkCrawler for StaticCrawler {
        async fn crawl(&self, _seed_url: &str, _max_pages: usize) -> Result<Vec<CrawlCandidate>, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_contacts_stop_at_probable_path() {
        let site = SitePages::new(&[
            ("https://acme.test/", "<h1>Acme</h1><a href='/team'>Team</a>"),
            (
                "https://acme.test/contact",
                r#"<a href="mailto:sales@acme.test">Mail</a> <a href="tel:+1-555-010-2030">Call</a>"#,
            ),
            ("https://acme.test/about", "<a href='mailto:about@acme.test'>x</a>"),
        ]);

        let report = discover_contacts(
            &site,
            None,
            "https://acme.test/",
            "find the email and phone",
            &DiscoveryOptions::default(),
        )
        .await;

        assert!(report.success);
        assert_eq!(report.emails, vec!["sales@acme.test"]);
        assert_eq!(report.phones.len(), 1);
        assert_eq!(report.pages_visited, vec!["https://acme.test/", "https://acme.test/contact"]);
        assert!(!site.requested().iter().any(|u| u.ends_with("/about")));
    }

    #[tokio::test]
    async fn test_contacts_fall_back_to_crawler_candidates() {
        let site = SitePages::new(&[
            ("https://acme.test/", "<h1>Acme</h1>"),
            ("https://acme.test/reach-us", r#"<a href="mailto:hi@acme.test">hi</a>"#),
            ("https://acme.test/login", r#"<a href="mailto:wrong@acme.test">x</a>"#),
        ]);
        let crawler = StaticCrawler(vec![
            CrawlCandidate::new("https://acme.test/login").with_title("Contact login"),
            CrawlCandidate::new("https://acme.test/reach-us").with_title("Contact our team"),
        ]);
        let options = DiscoveryOptions {
            limits: DiscoveryLimits::default().with_max_pages(20),
            ..Default::default()
        };

        let report = discover_contacts(&site, Some(&crawler), "https://acme.test/", "contact email", &options).await;

        assert!(report.success);
        assert_eq!(report.emails, vec!["hi@acme.test"]);
        assert!(!site.requested().iter().any(|u| u.ends_with("/login")));
    }

    #[tokio::test]
    async fn test_page_budget_is_respected() {
        let site = SitePages::new(&[("https://acme.test/", "<h1>Acme</h1>")]);
        let options = DiscoveryOptions {
            limits: DiscoveryLimits::default().with_max_pages(3),
            ..Default::default()
        };

        let report = discover_contacts(&site, None, "https://acme.test/", "find the email", &options).await;

        assert!(!report.success);
        assert_eq!(site.requested().len(), 3);
        assert!(report.error.unwrap().starts_with("No contact details found"));
    }

    #[tokio::test]
    async fn test_products_across_pages_dedup() {
        let page_one = r#"
            <div class="product-card"><a href="/products/a"><h3>Anchor</h3></a><span class="price">$10</span></div>
            <div class="product-card"><a href="/products/b"><h3>Buoy</h3></a><span class="price">$20</span></div>
            <a href="/shop?page=2">Next page</a>
        "#;
        let page_two = r#"
            <div class="product-card"><a href="/products/b"><h3>Buoy</h3></a></div>
            <div class="product-card"><a href="/products/c"><h3>Cleat</h3></a></div>
        "#;
        let site = SitePages::new(&[("https://shop.test/shop", page_one), ("https://shop.test/shop?page=2", page_two)]);

        let report = discover_products(
            &site,
            None,
            "https://shop.test/shop",
            "list all products",
            &DiscoveryOptions::default(),
        )
        .await;

        let names: Vec<&str> = report.products.iter().map(|p| p.name.as_str()).collect();
        assert!(report.success);
        assert_eq!(names, vec!["Anchor", "Buoy", "Cleat"]);
        assert_eq!(report.products[0].price.as_deref(), Some("$10"));
    }

    #[tokio::test]
    async fn test_assets_follow_task_kinds() {
        let seed = r#"
            <a href="/files/brochure.pdf">Brochure</a>
            <img src="/img/boat.jpg" alt="Boat">
            <a href="/downloads">Downloads</a>
        "#;
        let downloads = r#"<a href="/files/specs.pdf">Specs</a><a href="/files/brochure.pdf">Again</a>"#;
        let site = SitePages::new(&[("https://acme.test/", seed), ("https://acme.test/downloads", downloads)]);

        let report = harvest_assets(
            &site,
            None,
            "https://acme.test/",
            "download every pdf",
            &DiscoveryOptions::default(),
        )
        .await;

        let urls: Vec<&str> = report.assets.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://acme.test/files/brochure.pdf", "https://acme.test/files/specs.pdf"]);
        assert!(report.assets.iter().all(|a| a.kind == AssetKind::Pdf));
    }

    #[test]
    fn test_asset_kinds_default_to_all() {
        assert_eq!(asset_kinds(&detect_intent("grab the files")).len(), 3);
        assert_eq!(asset_kinds(&detect_intent("collect the photos")), vec![AssetKind::Image]);
    }
}
