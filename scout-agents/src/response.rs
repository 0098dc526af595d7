//! LLM response parsing
//!
//! Two tiers: `parse_strict` expects the `{thinking, action:{tool, params}}`
//! JSON object (code fences and surrounding prose tolerated); `salvage`
//! pulls the fields out with regexes when the JSON is broken or truncated.
//! Callers only see `ParsedResponse`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A tool invocation as emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl AgentAction {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// String parameter, if present and non-empty
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }
}

/// One think/act step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    #[serde(default)]
    pub thinking: String,
    pub action: AgentAction,
}

/// Tagged parse outcome
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Parsed(AgentStep),
    Unparseable { reason: String },
}

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap());
static THINKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"thinking"\s*:\s*"((?:[^"\\]|\\.)*)"#).unwrap());
static TOOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""tool"\s*:\s*"([A-Za-z_]+)""#).unwrap());
static URL_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""url"\s*:\s*"([^"\s]+)""#).unwrap());
static METHOD_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""method"\s*:\s*"([A-Za-z_-]+)""#).unwrap());
static MAX_PAGES_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""max_pages"\s*:\s*(\d+)"#).unwrap());
static RESULT_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"result"\s*:\s*"((?:[^"\\]|\\.)*)"#).unwrap());

/// Parse a model response, strict first, then salvage
pub fn parse_response(raw: &str) -> ParsedResponse {
    match parse_strict(raw) {
        Ok(step) => ParsedResponse::Parsed(step),
        Err(strict_error) => match salvage(raw) {
            Some(step) => ParsedResponse::Parsed(step),
            None => ParsedResponse::Unparseable {
                reason: format!("unparseable LLM response: {}", strict_error),
            },
        },
    }
}

/// Strict tier: one JSON object, optionally fenced or wrapped in prose
pub fn parse_strict(raw: &str) -> Result<AgentStep, String> {
    let body = FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = body.find('{').ok_or("no JSON object")?;
    let end = body.rfind('}').ok_or("unterminated JSON object")?;
    if end < start {
        return Err("unterminated JSON object".to_string());
    }

    serde_json::from_str::<AgentStep>(&body[start..=end]).map_err(|e| e.to_string())
}

/// Decode a captured JSON string body, keeping it raw if escapes are broken
fn unescape(captured: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", captured)).unwrap_or_else(|_| captured.replace("\\n", "\n"))
}

/// Salvage tier: regex extraction of the known fields
pub fn salvage(raw: &str) -> Option<AgentStep> {
    let tool = TOOL.captures(raw)?.get(1)?.as_str().to_lowercase();
    let thinking = THINKING
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
        .unwrap_or_default();

    let mut action = AgentAction::new(&tool);
    if let Some(url) = URL_PARAM.captures(raw).and_then(|c| c.get(1)) {
        action = action.with_param("url", url.as_str());
    }
    if let Some(method) = METHOD_PARAM.captures(raw).and_then(|c| c.get(1)) {
        action = action.with_param("method", method.as_str());
    }
    if let Some(max) = MAX_PAGES_PARAM
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        action = action.with_param("max_pages", max);
    }
    if let Some(result) = RESULT_PARAM.captures(raw).and_then(|c| c.get(1)) {
        action = action.with_param("result", unescape(result.as_str()));
    }

    Some(AgentStep { thinking, action })
}
