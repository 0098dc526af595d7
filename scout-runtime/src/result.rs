//! Per-URL result records

use chrono::{DateTime, Utc};
use serde::Serialize;

use scout_core::{ProductSummary, ScrapeMethod};

/// What the deterministic stage tried before escalating
#[derive(Debug, Clone, Serialize)]
pub struct NonLlmAttempt {
    pub tried: Vec<String>,
    pub reason: String,
}

/// Payload of a result
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductSummary>,
}

/// Run metadata
#[derive(Debug, Clone, Serialize)]
pub struct ResultMeta {
    pub used_llm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_method: Option<ScrapeMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_calls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_llm_attempt: Option<NonLlmAttempt>,
    pub elapsed_ms: u64,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl ResultMeta {
    pub fn new(run_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            used_llm: false,
            scrape_method: None,
            iterations: None,
            llm_calls: None,
            estimated_cost: None,
            non_llm_attempt: None,
            elapsed_ms: 0,
            run_id: run_id.to_string(),
            started_at,
        }
    }
}

/// Outbound record for one URL
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub url: String,
    pub task: String,
    pub success: bool,
    pub data: ResultData,
    pub meta: ResultMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let mut meta = ResultMeta::new("abc", Utc::now());
        meta.scrape_method = Some(ScrapeMethod::RenderedBrowser);
        let result = PipelineResult {
            url: "https://a.com".to_string(),
            task: "find email".to_string(),
            success: true,
            data: ResultData {
                text: "hi@a.com".to_string(),
                emails: vec!["hi@a.com".to_string()],
                ..Default::default()
            },
            meta,
            error: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["meta"]["scrape_method"], "rendered-browser");
        assert_eq!(json["meta"]["used_llm"], false);
        assert_eq!(json["data"]["emails"][0], "hi@a.com");
        assert!(json.get("error").is_none());
        assert!(json["data"].get("sources").is_none());
        assert!(json["meta"].get("iterations").is_none());
    }
}
