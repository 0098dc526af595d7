//! Common traits and settings for the agent layer

use async_trait::async_trait;

use scout_core::{AcquiredContent, DEFAULT_PREVIEW_CHARS};
use scout_fetch::{AcquireOptions, Acquirer};

/// Anything that can acquire a page for the agent's tools
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn acquire(&self, url: &str, options: &AcquireOptions) -> AcquiredContent;
}

#[async_trait]
impl PageSource for Acquirer {
    async fn acquire(&self, url: &str, options: &AcquireOptions) -> AcquiredContent {
        Acquirer::acquire(self, url, options).await
    }
}

/// Agent loop configuration
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Run identifier used in logs
    pub id: String,
    /// Think/act cycles before forced synthesis
    pub max_iterations: usize,
    /// Deadline wrapped around every LLM call
    pub llm_timeout_secs: u64,
    /// Characters of the stage-1 page shown in each prompt
    pub preview_chars: usize,
    /// Characters of each other accumulated page shown in each prompt
    pub other_page_chars: usize,
    /// Characters kept per scratchpad field
    pub scratchpad_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            max_iterations: 5,
            llm_timeout_secs: 90,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            other_page_chars: 800,
            scratchpad_chars: 500,
        }
    }
}

impl AgentSettings {
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_llm_timeout(mut self, secs: u64) -> Self {
        self.llm_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = AgentSettings::default();
        assert_eq!(settings.max_iterations, 5);
        assert_eq!(settings.id.len(), 8);
        assert_eq!(AgentSettings::default().with_max_iterations(0).max_iterations, 1);
    }
}
