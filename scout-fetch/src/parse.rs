//! HTML parsing: visible text, title, links, assets and product cards

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use scout_core::{CrawlCandidate, ProductSummary};

use crate::guard::same_site;

/// Title and visible text of a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Extract title and text content from HTML
pub fn extract_content(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = title_of(&document);

    let Ok(body_selector) = Selector::parse("body") else {
        return ParsedPage { title, text: String::new() };
    };

    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut text_parts = Vec::new();
    for node_ref in root.descendants() {
        if let Node::Text(text_node) = node_ref.value() {
            let in_hidden = node_ref.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                    .unwrap_or(false)
            });

            if !in_hidden {
                let trimmed = text_node.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
        }
    }

    ParsedPage {
        title,
        text: normalize_whitespace(&text_parts.join(" ")),
    }
}

/// Extract just the `<title>`
pub fn extract_title(html: &str) -> Option<String> {
    title_of(&Html::parse_document(html))
}

fn title_of(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extensions that mark a link as a file rather than a page
const FILE_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".gz", ".rar", ".7z", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp",
    ".ico", ".css", ".js", ".mp3", ".mp4", ".mov", ".csv", ".xls", ".xlsx", ".doc", ".docx",
    ".ppt", ".pptx", ".exe", ".dmg", ".woff", ".woff2",
];

fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Internal page links (same registrable domain), deduplicated, with anchor text
pub fn extract_links(html: &str, base: &Url) -> Vec<CrawlCandidate> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(base.as_str().trim_end_matches('/').to_string());

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(url) = element.value().attr("href").and_then(|h| resolve(base, h)) else {
            continue;
        };
        if !same_site(base, &url) {
            continue;
        }
        let path = url.path().to_lowercase();
        if FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            continue;
        }
        let key = url.as_str().trim_end_matches('/').to_string();
        if !seen.insert(key) {
            continue;
        }

        let anchor = normalize_whitespace(&element.text().collect::<String>());
        let mut candidate = CrawlCandidate::new(url.to_string()).with_title(anchor);
        if let Some(title) = element.value().attr("title") {
            candidate = candidate.with_snippet(title);
        }
        links.push(candidate);
    }

    links
}

/// Downloadable asset categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Pdf,
    Image,
    Csv,
}

impl AssetKind {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Pdf => &[".pdf"],
            AssetKind::Image => &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"],
            AssetKind::Csv => &[".csv", ".xls", ".xlsx"],
        }
    }

    fn classify(url: &Url) -> Option<AssetKind> {
        let path = url.path().to_lowercase();
        [AssetKind::Pdf, AssetKind::Image, AssetKind::Csv]
            .into_iter()
            .find(|kind| kind.extensions().iter().any(|ext| path.ends_with(ext)))
    }
}

/// A link to a downloadable file
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetLink {
    pub url: String,
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Links (`a[href]`) and images (`img[src]`) pointing at files of the given kinds
///
/// Assets may live on CDNs, so no same-site filter is applied.
pub fn extract_assets(html: &str, base: &Url, kinds: &[AssetKind]) -> Vec<AssetLink> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    let sources = [("a[href]", "href"), ("img[src]", "src"), ("source[src]", "src")];
    for (css, attr) in sources {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(url) = element.value().attr(attr).and_then(|h| resolve(base, h)) else {
                continue;
            };
            let Some(kind) = AssetKind::classify(&url) else {
                continue;
            };
            if !kinds.contains(&kind) || !seen.insert(url.to_string()) {
                continue;
            }
            let label = element
                .value()
                .attr("alt")
                .map(str::to_string)
                .or_else(|| Some(normalize_whitespace(&element.text().collect::<String>())))
                .filter(|l| !l.is_empty());
            assets.push(AssetLink {
                url: url.to_string(),
                kind,
                label,
            });
        }
    }

    assets
}

/// Product card selectors, most specific first
const PRODUCT_CARD_SELECTORS: &[&str] = &[
    "[itemtype*='schema.org/Product']",
    ".product-card",
    ".product-item",
    "article.product_pod",
    "li.product",
    ".product-tile",
    ".grid-product",
    "[data-product-id]",
    ".card-product",
    ".product",
];

const PRODUCT_PATH_HINTS: &[&str] = &["/product", "/products/", "/p/", "/item", "/dp/", "/shop/"];

const MAX_PRODUCTS: usize = 200;

static PRICE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[$€£¥]\s?\d[\d,.]*)|(?:\d[\d,.]*\s?(?:USD|EUR|GBP|€|kr))").unwrap()
});

fn element_text(el: &ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

fn card_link<'a>(card: &ElementRef<'a>) -> Option<(String, ElementRef<'a>)> {
    if card.value().name() == "a" {
        if let Some(href) = card.value().attr("href") {
            return Some((href.to_string(), *card));
        }
    }
    let selector = Selector::parse("a[href]").ok()?;
    let anchors: Vec<ElementRef> = card.select(&selector).collect();
    let preferred = anchors.iter().find(|a| {
        a.value()
            .attr("href")
            .map(|h| PRODUCT_PATH_HINTS.iter().any(|hint| h.to_lowercase().contains(hint)))
            .unwrap_or(false)
    });
    preferred
        .or_else(|| anchors.first())
        .and_then(|a| a.value().attr("href").map(|h| (h.to_string(), *a)))
}

fn card_name(card: &ElementRef, link: &ElementRef) -> Option<String> {
    let styled = Selector::parse("[class*='title'], [class*='name'], [itemprop='name'], h1, h2, h3, h4, h5").ok()?;
    card.select(&styled)
        .map(|el| element_text(&el))
        .find(|t| t.chars().count() >= 2)
        .or_else(|| Some(element_text(link)).filter(|t| t.chars().count() >= 2))
        .or_else(|| link.value().attr("title").map(normalize_whitespace))
        .filter(|t| t.chars().count() >= 2)
}

fn card_price(card: &ElementRef) -> Option<String> {
    let styled = Selector::parse("[class*='price'], [itemprop='price']").ok()?;
    card.select(&styled)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
        .or_else(|| PRICE_TEXT.find(&element_text(card)).map(|m| m.as_str().trim().to_string()))
}

/// Detect product cards using the first selector that yields matches
pub fn extract_products(html: &str, base: &Url) -> Vec<ProductSummary> {
    let document = Html::parse_document(html);

    for css in PRODUCT_CARD_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let cards: Vec<ElementRef> = document.select(&selector).collect();
        if cards.is_empty() {
            continue;
        }

        let mut seen = HashSet::new();
        let mut products = Vec::new();
        for card in cards {
            let Some((href, link)) = card_link(&card) else {
                continue;
            };
            let Some(url) = resolve(base, &href) else {
                continue;
            };
            let Some(name) = card_name(&card, &link) else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }
            products.push(ProductSummary {
                name,
                url: url.to_string(),
                price: card_price(&card),
            });
            if products.len() >= MAX_PRODUCTS {
                break;
            }
        }
        return products;
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/catalog/").unwrap()
    }

    #[test]
    fn test_extract_content() {
        let html = r#"
            <html>
            <head><title>Test Page</title></head>
            <body>
                <script>var x = 1;</script>
                <h1>Hello World</h1>
                <p>This is test content.</p>
                <style>.x { color: red; }</style>
            </body>
            </html>
        "#;

        let page = extract_content(html);

        assert_eq!(page.title, Some("Test Page".to_string()));
        assert!(page.text.contains("Hello World"));
        assert!(page.text.contains("test content"));
        assert!(!page.text.contains("var x"));
        assert!(!page.text.contains("color: red"));
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "  hello   world  \n\t  test  ";
        assert_eq!(normalize_whitespace(input), "hello world test");
    }

    #[test]
    fn test_extract_links_internal_only() {
        let html = r##"
            <a href="/contact">Contact us</a>
            <a href="https://blog.example.com/post">Blog</a>
            <a href="https://elsewhere.org/">Other</a>
            <a href="#top">Top</a>
            <a href="/brochure.pdf">Brochure</a>
            <a href="/contact#form">Contact form</a>
            <a href="mailto:a@b.com">Mail</a>
        "##;
        let links = extract_links(html, &base());
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://shop.example.com/contact", "https://blog.example.com/post"]);
        assert_eq!(links[0].title.as_deref(), Some("Contact us"));
    }

    #[test]
    fn test_extract_assets() {
        let html = r#"
            <a href="/files/report.pdf">Annual report</a>
            <a href="https://cdn.other.net/data.csv">Data</a>
            <img src="/img/logo.png" alt="Logo">
            <a href="/about">About</a>
        "#;
        let pdfs = extract_assets(html, &base(), &[AssetKind::Pdf]);
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].url, "https://shop.example.com/files/report.pdf");
        assert_eq!(pdfs[0].label.as_deref(), Some("Annual report"));

        let all = extract_assets(html, &base(), &[AssetKind::Pdf, AssetKind::Csv, AssetKind::Image]);
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|a| a.kind == AssetKind::Image && a.label.as_deref() == Some("Logo")));
    }

    #[test]
    fn test_extract_products() {
        let html = r#"
            <ul>
              <li class="product">
                <a href="/products/red-shoe"><img src="a.jpg"></a>
                <h2 class="product-title">Red Shoe</h2>
                <span class="price">$49.99</span>
              </li>
              <li class="product">
                <a href="/products/blue-shoe" title="Blue Shoe">Blue Shoe</a>
                <p>Only €39</p>
              </li>
              <li class="product">
                <a href="/products/red-shoe">Red Shoe again</a>
              </li>
              <li class="product"><span>no link</span></li>
              <li class="product"><a href="/products/x">x</a></li>
            </ul>
        "#;
        let products = extract_products(html, &base());
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Red Shoe");
        assert_eq!(products[0].url, "https://shop.example.com/products/red-shoe");
        assert_eq!(products[0].price.as_deref(), Some("$49.99"));
        assert_eq!(products[1].name, "Blue Shoe");
        assert_eq!(products[1].price.as_deref(), Some("€39"));
    }

    #[test]
    fn test_products_none() {
        assert!(extract_products("<p>nothing to buy</p>", &base()).is_empty());
    }
}
