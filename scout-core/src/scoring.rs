//! Crawl candidate scoring
//!
//! Ranks discovered URLs by weighted keyword hits in URL, title and
//! snippet, with heavy penalties for paths that never hold useful data.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::TaskIntent;

/// A URL discovered by link extraction or an external crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCandidate {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl CrawlCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.title = Some(title.trim().to_string());
        }
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        if !snippet.trim().is_empty() {
            self.snippet = Some(snippet.trim().to_string());
        }
        self
    }
}

pub const URL_WEIGHT: i32 = 5;
pub const TITLE_WEIGHT: i32 = 3;
pub const SNIPPET_WEIGHT: i32 = 1;
pub const PENALTY: i32 = -50;

/// Path segments that are never worth inspecting. A segment matches when it
/// equals the entry or starts with it followed by `-`, `_` or `.`.
const PENALIZED: &[&str] = &[
    "login", "signin", "sign-in", "signup", "sign-up", "register", "logout",
    "cart", "checkout", "basket", "account", "my-account", "password", "wishlist",
    "privacy", "terms", "legal", "cookies", "cookie-policy", "cookie-settings", "gdpr", "disclaimer",
    "feed", "rss", "wp-json", "atom", "tag", "author",
];

const CONTACT_KEYWORDS: &[&str] = &["contact", "about", "support", "team", "impressum", "kontakt", "help", "staff", "people"];
const PRODUCT_KEYWORDS: &[&str] = &["product", "shop", "store", "catalog", "collection", "category", "page", "all"];
const DOCUMENT_KEYWORDS: &[&str] = &["download", "document", "resource", "publication", "report", "library", "media", "press"];
const IMAGE_KEYWORDS: &[&str] = &["gallery", "photo", "image", "media", "portfolio"];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "from", "with", "this", "that", "find", "get", "all",
    "page", "site", "website", "please", "list", "give", "show", "their", "them",
    "extract", "what", "which", "about",
];

/// Keywords implied by the intent plus the task's own content words
pub fn keywords_for(intent: &TaskIntent, task: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut add = |words: &[&str]| {
        for word in words {
            if !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }
    };

    if intent.wants_contact() {
        add(CONTACT_KEYWORDS);
    }
    if intent.wants_product_list {
        add(PRODUCT_KEYWORDS);
    }
    if intent.wants_pdf || intent.wants_csv {
        add(DOCUMENT_KEYWORDS);
    }
    if intent.wants_images {
        add(IMAGE_KEYWORDS);
    }

    let task_words: Vec<String> = task
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect();
    for word in task_words {
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }

    keywords
}

/// Path and query of a URL; the host never counts toward penalties
fn path_and_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

fn segment_matches(segment: &str, entry: &str) -> bool {
    match segment.strip_prefix(entry) {
        Some("") => true,
        Some(rest) => rest.starts_with(['-', '_', '.']),
        None => false,
    }
}

/// Whether a URL's path or query hits the penalty list
pub fn is_penalized(url: &str) -> bool {
    let target = path_and_query(url).to_lowercase();
    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    if path.ends_with(".xml") {
        return true;
    }

    path.split('/')
        .chain(query.split(['&', '=', '/']))
        .filter(|segment| !segment.is_empty())
        .any(|segment| PENALIZED.iter().any(|entry| segment_matches(segment, entry)))
}

/// Score one candidate: URL hits weigh more than title hits, which weigh
/// more than snippet hits.
pub fn score_candidate(candidate: &CrawlCandidate, keywords: &[String]) -> i32 {
    let url = candidate.url.to_lowercase();
    let title = candidate.title.as_deref().unwrap_or_default().to_lowercase();
    let snippet = candidate.snippet.as_deref().unwrap_or_default().to_lowercase();

    let mut score = 0;
    for keyword in keywords {
        if url.contains(keyword.as_str()) {
            score += URL_WEIGHT;
        }
        if title.contains(keyword.as_str()) {
            score += TITLE_WEIGHT;
        }
        if snippet.contains(keyword.as_str()) {
            score += SNIPPET_WEIGHT;
        }
    }

    if is_penalized(&candidate.url) {
        score += PENALTY;
    }
    score
}

/// Sort candidates by descending score, dropping penalized ones, and keep
/// at most `limit`. Ties keep discovery order.
pub fn rank_candidates(candidates: Vec<CrawlCandidate>, keywords: &[String], limit: usize) -> Vec<(CrawlCandidate, i32)> {
    let mut scored: Vec<(CrawlCandidate, i32)> = candidates
        .into_iter()
        .map(|c| {
            let score = score_candidate(&c, keywords);
            (c, score)
        })
        .filter(|(_, score)| *score > PENALTY / 2)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect_intent;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_weights_ordered() {
        let keywords = kw(&["contact"]);
        let in_url = CrawlCandidate::new("https://a.com/contact");
        let in_title = CrawlCandidate::new("https://a.com/x").with_title("Contact us");
        let in_snippet = CrawlCandidate::new("https://a.com/y").with_snippet("how to contact");

        let u = score_candidate(&in_url, &keywords);
        let t = score_candidate(&in_title, &keywords);
        let s = score_candidate(&in_snippet, &keywords);
        assert!(u > t && t > s && s > 0);
    }

    #[test]
    fn test_penalties() {
        let keywords = kw(&["contact"]);
        let login = CrawlCandidate::new("https://a.com/login?next=/contact");
        assert!(score_candidate(&login, &keywords) < 0);
        assert!(is_penalized("https://a.com/feed.xml"));
        assert!(is_penalized("https://a.com/sitemap.xml"));
        assert!(is_penalized("https://a.com/legal-notice"));
        assert!(is_penalized("https://a.com/user/login.php"));
        assert!(is_penalized("https://a.com/blog/tag/news"));
        assert!(is_penalized("https://a.com/page?view=cart"));
        assert!(!is_penalized("https://a.com/about"));
    }

    #[test]
    fn test_host_words_not_penalized() {
        let keywords = keywords_for(&detect_intent("find the contact email"), "find the contact email");
        for url in [
            "https://www.legalzoom.com/contact",
            "https://www.cartier.com/en-us/contact-us",
            "https://feedly.com/about",
        ] {
            assert!(!is_penalized(url), "{url}");
            let candidate = CrawlCandidate::new(url).with_title("Contact us");
            assert!(score_candidate(&candidate, &keywords) > 0, "{url}");
            assert_eq!(rank_candidates(vec![candidate], &keywords, 5).len(), 1, "{url}");
        }
    }

    #[test]
    fn test_penalty_words_inside_other_words() {
        assert!(!is_penalized("https://a.com/feedback"));
        assert!(!is_penalized("https://a.com/anatomy"));
        assert!(!is_penalized("https://a.com/determs"));
        assert!(!is_penalized("https://a.com/recipes/chocolate-chip-cookie"));
        assert!(!is_penalized("https://a.com/authors-guild/contact"));
        assert!(is_penalized("https://a.com/terms-of-service"));
        assert!(is_penalized("https://a.com/cookie-policy"));
    }

    #[test]
    fn test_rank_drops_penalized_and_caps() {
        let keywords = kw(&["contact", "about"]);
        let candidates = vec![
            CrawlCandidate::new("https://a.com/cart"),
            CrawlCandidate::new("https://a.com/blog"),
            CrawlCandidate::new("https://a.com/about"),
            CrawlCandidate::new("https://a.com/contact-about"),
        ];
        let ranked = rank_candidates(candidates, &keywords, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.url, "https://a.com/contact-about");
        assert_eq!(ranked[1].0.url, "https://a.com/about");
    }

    #[test]
    fn test_keywords_from_intent_and_task() {
        let task = "find the support email for billing";
        let keywords = keywords_for(&detect_intent(task), task);
        assert!(keywords.contains(&"contact".to_string()));
        assert!(keywords.contains(&"billing".to_string()));
        assert!(!keywords.contains(&"find".to_string()));
    }
}
