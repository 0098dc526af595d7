//! Deterministic, intent-driven extraction
//!
//! Tries to satisfy a task from one acquired page with regexes and DOM
//! heuristics only. The attempt always explains itself through `reason`
//! and `what_was_tried`, and is handed to the agent as context when it
//! fails.

use serde::Serialize;
use tracing::debug;
use url::Url;

use scout_core::{detect_intent, extract_emails, extract_phones, is_question, AcquiredContent, ExtractedData, TaskIntent};
use scout_fetch::{extract_products, extract_title};

/// Reason attached when nothing deterministic answers the task
pub const LLM_NEEDED: &str = "LLM needed for interpretation";

/// Outcome of a deterministic extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub success: bool,
    /// Always present on success; partial data on failure
    pub data: Option<ExtractedData>,
    /// Method names in the order they were attempted
    pub what_was_tried: Vec<String>,
    pub reason: String,
    pub detected_intent: TaskIntent,
}

impl ExtractionAttempt {
    fn failed(data: ExtractedData, tried: Vec<String>, reason: impl Into<String>, intent: TaskIntent) -> Self {
        Self {
            success: false,
            data: Some(data),
            what_was_tried: tried,
            reason: reason.into(),
            detected_intent: intent,
        }
    }

    /// Short block for the agent prompt
    pub fn summary(&self, max_text: usize) -> String {
        let mut out = format!(
            "Deterministic extraction {} ({}). Tried: {}\n",
            if self.success { "succeeded" } else { "failed" },
            self.reason,
            self.what_was_tried.join(", ")
        );
        if let Some(data) = &self.data {
            out.push_str(&data.summary(max_text));
        }
        out
    }
}

/// Attempt to answer `task` from `content` without an LLM
pub fn try_extract(content: &AcquiredContent, task: &str) -> ExtractionAttempt {
    let intent = detect_intent(task);
    let mut tried = vec!["title".to_string()];
    let mut data = ExtractedData {
        title: extract_title(&content.html),
        ..Default::default()
    };

    if intent.wants_email {
        tried.push("email".to_string());
        data.emails = extract_emails(&content.html, &content.text);
    }
    if intent.wants_phone {
        tried.push("phone".to_string());
        data.phones = extract_phones(&content.html, &content.text);
    }
    if intent.wants_product_list {
        tried.push("products".to_string());
        if let Ok(base) = Url::parse(&content.url) {
            data.products = extract_products(&content.html, &base);
        }
    }
    if intent.wants_text_dump || intent.is_general {
        tried.push("text".to_string());
        if !content.text.trim().is_empty() {
            data.text = Some(content.text.clone());
        }
    }

    debug!(
        "Extraction for {}: {} emails, {} phones, {} products",
        content.url,
        data.emails.len(),
        data.phones.len(),
        data.products.len()
    );

    let mut missing = Vec::new();
    if intent.wants_email && data.emails.is_empty() {
        missing.push("email");
    }
    if intent.wants_phone && data.phones.is_empty() {
        missing.push("phone number");
    }
    if intent.wants_product_list && data.products.is_empty() {
        missing.push("products");
    }
    if !missing.is_empty() {
        let reason = format!("no {} found on the page", missing.join(" or "));
        return ExtractionAttempt::failed(data, tried, reason, intent);
    }

    if intent.needs_synthesis() {
        return ExtractionAttempt::failed(
            data,
            tried,
            "task needs multi-step reasoning or synthesis, LLM required",
            intent,
        );
    }

    if intent.is_general && is_question(task) {
        return ExtractionAttempt::failed(data, tried, "task is a question that needs interpretation", intent);
    }

    if intent.wants_screenshot {
        return ExtractionAttempt::failed(data, tried, "screenshot tasks are handled by the screenshot operation", intent);
    }
    if intent.wants_download() {
        return ExtractionAttempt::failed(data, tried, "file downloads are handled by asset harvesting", intent);
    }

    let text_found = data.has_text() && (intent.wants_text_dump || intent.is_general);
    if data.has_structured() || text_found {
        let mut found = Vec::new();
        if !data.emails.is_empty() {
            found.push(format!("{} email(s)", data.emails.len()));
        }
        if !data.phones.is_empty() {
            found.push(format!("{} phone number(s)", data.phones.len()));
        }
        if !data.products.is_empty() {
            found.push(format!("{} product(s)", data.products.len()));
        }
        if text_found {
            found.push("page text".to_string());
        }
        return ExtractionAttempt {
            success: true,
            data: Some(data),
            what_was_tried: tried,
            reason: format!("found {}", found.join(", ")),
            detected_intent: intent,
        };
    }

    if data.text.is_none() && !content.text.trim().is_empty() {
        data.text = Some(content.text.clone());
    }
    ExtractionAttempt::failed(data, tried, LLM_NEEDED, intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::ScrapeMethod;

    fn page(html: &str, text: &str) -> AcquiredContent {
        AcquiredContent::succeeded(
            "https://shop.example.org/",
            html.to_string(),
            text.to_string(),
            ScrapeMethod::DirectHttp,
            12,
        )
    }

    const CONTACT: &str = r#"<html><head><title>Example Org</title></head>
        <body><a href="mailto:hello@example.org">Write to us</a> Call +1 (555) 010-2030</body></html>"#;

    #[test]
    fn test_mailto_email_succeeds() {
        let attempt = try_extract(&page(CONTACT, "Write to us Call +1 (555) 010-2030"), "find the contact email");
        assert!(attempt.success, "{}", attempt.reason);
        let data = attempt.data.unwrap();
        assert_eq!(data.emails, vec!["hello@example.org"]);
        assert_eq!(data.title.as_deref(), Some("Example Org"));
        assert_eq!(attempt.what_was_tried, vec!["title", "email"]);
    }

    #[test]
    fn test_missing_requested_type_fails() {
        let attempt = try_extract(
            &page("<html><body>Call +1 (555) 010-2030</body></html>", "Call +1 (555) 010-2030"),
            "Find the contact email and phone number",
        );
        assert!(!attempt.success);
        assert_eq!(attempt.reason, "no email found on the page");
        // partial data is still attached
        assert_eq!(attempt.data.unwrap().phones.len(), 1);
    }

    #[test]
    fn test_complex_task_forces_llm() {
        let html = r#"<div class="product-card"><a href="/products/mug">Mug</a><span class="price">$9</span></div>
            <div class="product-card"><a href="/products/cap">Cap</a></div>"#;
        let task = "First get the product list, then summarize the prices";
        let attempt = try_extract(&page(html, "Mug $9 Cap"), task);
        assert!(!attempt.success);
        assert!(attempt.detected_intent.is_complex_task);
        assert!(attempt.reason.contains("LLM required"));
        assert_eq!(attempt.data.unwrap().products.len(), 2);
    }

    #[test]
    fn test_general_question_fails() {
        let attempt = try_extract(&page("<p>We sell boats</p>", "We sell boats"), "Who founded this company?");
        assert!(!attempt.success);
        assert!(attempt.detected_intent.is_general);
        assert!(attempt.reason.contains("question"));
    }

    #[test]
    fn test_screenshot_routed_elsewhere() {
        let attempt = try_extract(&page(CONTACT, "Write to us"), "take a screenshot");
        assert!(!attempt.success);
        assert!(attempt.reason.contains("screenshot operation"));
    }

    #[test]
    fn test_text_dump_succeeds() {
        let attempt = try_extract(&page("<article>Long read</article>", "Long read"), "get the article text");
        assert!(attempt.success);
        assert_eq!(attempt.data.unwrap().text.as_deref(), Some("Long read"));
    }

    #[test]
    fn test_nothing_found_attaches_text() {
        let attempt = try_extract(&page("<html><body></body></html>", ""), "grab the full text");
        assert!(!attempt.success);
        assert_eq!(attempt.reason, LLM_NEEDED);
        assert!(!attempt.reason.is_empty());
    }
}
