//! Acquired page content and the structured data pulled out of it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Transport used to acquire a page, ordered by cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapeMethod {
    /// Plain HTTP GET
    DirectHttp,
    /// Anti-bot bypass proxy
    BypassProxy,
    /// Headless browser render
    RenderedBrowser,
}

impl ScrapeMethod {
    /// All methods in fallback order (cheapest first)
    pub const CHAIN: [ScrapeMethod; 3] = [
        ScrapeMethod::DirectHttp,
        ScrapeMethod::BypassProxy,
        ScrapeMethod::RenderedBrowser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMethod::DirectHttp => "direct-http",
            ScrapeMethod::BypassProxy => "bypass-proxy",
            ScrapeMethod::RenderedBrowser => "rendered-browser",
        }
    }
}

impl fmt::Display for ScrapeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown scrape method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for ScrapeMethod {
    type Err = UnknownMethod;

    /// Accepts the canonical names plus the short aliases an LLM tends to use
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "direct-http" | "http" | "direct" | "fetch" => Ok(ScrapeMethod::DirectHttp),
            "bypass-proxy" | "bypass" | "proxy" | "flaresolverr" => Ok(ScrapeMethod::BypassProxy),
            "rendered-browser" | "browser" | "render" | "headless" | "playwright" | "puppeteer" => {
                Ok(ScrapeMethod::RenderedBrowser)
            }
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

/// Result of fetching one URL
///
/// Created fresh per acquisition and never mutated afterwards; the agent
/// shares it by `Arc` inside its accumulated-content map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredContent {
    pub url: String,
    /// Raw markup, empty on failure
    pub html: String,
    /// Visible text
    pub text: String,
    /// Transport that produced the content (last one tried on failure)
    pub method: Option<ScrapeMethod>,
    pub elapsed_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl AcquiredContent {
    pub fn succeeded(url: &str, html: String, text: String, method: ScrapeMethod, elapsed_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            html,
            text,
            method: Some(method),
            elapsed_ms,
            success: true,
            error: None,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            html: String::new(),
            text: String::new(),
            method: None,
            elapsed_ms,
            success: false,
            error: Some(error.into()),
        }
    }

    /// First `max_chars` characters of the visible text
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.text, max_chars)
    }
}

/// A product card found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    /// Absolute URL, used as the dedup key
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// Structured payload of a deterministic extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ExtractedData {
    /// Whether any contact or product data was found (title and text don't count)
    pub fn has_structured(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty() || !self.products.is_empty()
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Render as a short human-readable block for prompts and fallbacks
    pub fn summary(&self, max_text: usize) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(&format!("Title: {}\n", title));
        }
        if !self.emails.is_empty() {
            out.push_str(&format!("Emails: {}\n", self.emails.join(", ")));
        }
        if !self.phones.is_empty() {
            out.push_str(&format!("Phones: {}\n", self.phones.join(", ")));
        }
        if !self.products.is_empty() {
            out.push_str(&format!("Products ({}):\n", self.products.len()));
            for product in self.products.iter().take(20) {
                match &product.price {
                    Some(price) => out.push_str(&format!("- {} ({}) {}\n", product.name, price, product.url)),
                    None => out.push_str(&format!("- {} {}\n", product.name, product.url)),
                }
            }
        }
        if let Some(text) = &self.text {
            if !text.is_empty() {
                out.push_str(&format!("Text: {}\n", truncate_chars(text, max_text)));
            }
        }
        out
    }
}

/// Truncate on a char boundary, appending an ellipsis when shortened
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
