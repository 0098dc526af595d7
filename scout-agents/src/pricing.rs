//! Per-call LLM cost estimates
//!
//! Lookup is by substring of the model name, first match wins, so more
//! specific names come before their prefixes.

/// Estimated USD per agent call for unknown models
pub const DEFAULT_CALL_COST: f64 = 0.01;

const PRICING: &[(&str, f64)] = &[
    ("gpt-4o-mini", 0.0006),
    ("gpt-4.1-nano", 0.0004),
    ("gpt-4.1-mini", 0.0016),
    ("gpt-4.1", 0.008),
    ("gpt-4o", 0.01),
    ("gpt-4-turbo", 0.03),
    ("gpt-4", 0.06),
    ("gpt-3.5", 0.0015),
    ("o1-mini", 0.012),
    ("o3-mini", 0.0044),
    ("o1", 0.06),
    ("claude-3-5-haiku", 0.004),
    ("claude-3-haiku", 0.00125),
    ("claude-3-5-sonnet", 0.015),
    ("claude-3-7-sonnet", 0.015),
    ("claude-sonnet", 0.015),
    ("claude-3-opus", 0.075),
    ("claude-opus", 0.075),
    ("gemini-1.5-flash", 0.0003),
    ("gemini-2.0-flash", 0.0004),
    ("gemini", 0.005),
    ("llama", 0.0008),
    ("mistral", 0.002),
    ("deepseek", 0.0011),
];

/// Estimated cost of one call to `model`
pub fn estimate_call_cost(model: &str) -> f64 {
    let model = model.to_lowercase();
    PRICING
        .iter()
        .find(|(needle, _)| model.contains(needle))
        .map(|(_, cost)| *cost)
        .unwrap_or(DEFAULT_CALL_COST)
}

/// Render a running total as a currency string
pub fn format_cost(total: f64) -> String {
    format!("${:.4}", total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_before_prefix() {
        assert_eq!(estimate_call_cost("gpt-4o-mini-2024-07-18"), 0.0006);
        assert_eq!(estimate_call_cost("openai/gpt-4o"), 0.01);
        assert_eq!(estimate_call_cost("anthropic/claude-3-5-haiku-latest"), 0.004);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        assert_eq!(estimate_call_cost("my-finetune"), DEFAULT_CALL_COST);
        assert_eq!(format_cost(3.0 * DEFAULT_CALL_COST), "$0.0300");
    }
}
