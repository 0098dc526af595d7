//! Runtime configuration
//!
//! Optional TOML file; every field has a default so a partial file (or none)
//! is valid. Command-line flags are applied on top by the CLI.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use scout_agents::{
    create_anthropic_backend, create_backend, AgentSettings, AnthropicConfig, OpenAIBackendConfig, PersonaRegistry,
    SharedBackend,
};
use scout_fetch::{AcquireOptions, Acquirer, CrawlerConfig, FetchConfig, HttpCrawler};

use crate::{DiscoveryLimits, Pipeline, PipelineConfig};

/// LLM provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    OpenRouter,
    Anthropic,
    /// OpenAI-compatible local server (Ollama, vLLM, LM Studio)
    Local,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "local" | "ollama" => Ok(LlmProvider::Local),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub http_timeout_secs: u64,
    pub bypass_timeout_secs: u64,
    pub browser_timeout_secs: u64,
    pub bypass_proxy_url: Option<String>,
    pub chrome_executable: Option<String>,
    pub allow_private_hosts: bool,
    /// Skip the rendered-browser step
    pub no_render: bool,
}

impl Default for FetchSection {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            http_timeout_secs: fetch.http_timeout_secs,
            bypass_timeout_secs: fetch.bypass_timeout_secs,
            browser_timeout_secs: fetch.browser_timeout_secs,
            bypass_proxy_url: None,
            chrome_executable: None,
            allow_private_hosts: false,
            no_render: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    /// Usually supplied through the environment instead
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_iterations: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        let agent = AgentSettings::default();
        Self {
            enabled: true,
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: agent.llm_timeout_secs,
            max_iterations: agent.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSection {
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fetch: FetchSection,
    pub llm: LlmSection,
    pub crawler: CrawlerSection,
    pub discovery: DiscoveryLimits,
    /// URLs processed concurrently in a batch
    pub concurrency: usize,
    /// Directory of persona TOML files overriding the embedded prompts
    pub persona_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSection::default(),
            llm: LlmSection::default(),
            crawler: CrawlerSection::default(),
            discovery: DiscoveryLimits::default(),
            concurrency: 3,
            persona_dir: None,
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.llm.max_iterations == 0 {
            bail!("llm.max_iterations must be at least 1");
        }
        if self.discovery.max_pages == 0 {
            bail!("discovery.max_pages must be at least 1");
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let mut fetch = FetchConfig::default()
            .with_http_timeout(self.fetch.http_timeout_secs)
            .with_browser_timeout(self.fetch.browser_timeout_secs);
        fetch.bypass_timeout_secs = self.fetch.bypass_timeout_secs;
        fetch.allow_private_hosts = self.fetch.allow_private_hosts;
        if let Some(proxy) = &self.fetch.bypass_proxy_url {
            fetch = fetch.with_bypass_proxy(proxy);
        }
        if let Some(chrome) = &self.fetch.chrome_executable {
            fetch = fetch.with_chrome_executable(chrome);
        }
        fetch
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings::default()
            .with_max_iterations(self.llm.max_iterations)
            .with_llm_timeout(self.llm.timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut acquire = AcquireOptions::default();
        if self.fetch.no_render {
            acquire = acquire.without_render();
        }
        PipelineConfig {
            use_llm: self.llm.enabled,
            acquire,
            agent: self.agent_settings(),
            limits: self.discovery.clone(),
            ..Default::default()
        }
        .with_concurrency(self.concurrency)
    }

    /// The configured backend, or `None` when the LLM is disabled
    pub fn build_backend(&self) -> Result<Option<SharedBackend>> {
        if !self.llm.enabled {
            return Ok(None);
        }

        let key = self.llm.api_key.as_deref().unwrap_or_default();
        let backend = match self.llm.provider {
            LlmProvider::Anthropic => {
                let mut config = AnthropicConfig::new(key, &self.llm.model);
                if let Some(base) = &self.llm.base_url {
                    config.base_url = base.trim_end_matches('/').to_string();
                }
                create_anthropic_backend(config)
            }
            LlmProvider::OpenAI => {
                let mut config = OpenAIBackendConfig::openai(key, &self.llm.model);
                if let Some(base) = &self.llm.base_url {
                    config = config.with_base_url(base);
                }
                create_backend(config)
            }
            LlmProvider::OpenRouter => create_backend(OpenAIBackendConfig::openrouter(key, &self.llm.model)),
            LlmProvider::Local => {
                let base = self.llm.base_url.as_deref().unwrap_or("http://localhost:11434/v1");
                let mut config = OpenAIBackendConfig::local(base, &self.llm.model);
                if !key.is_empty() {
                    config.api_key = key.to_string();
                }
                create_backend(config)
            }
        }
        .with_context(|| format!("Failed to create {:?} backend", self.llm.provider))?;

        info!("Using {:?} model {}", self.llm.provider, backend.model_name());
        Ok(Some(backend))
    }

    /// Wire transports, backend and crawler into a pipeline
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let acquirer = Acquirer::new(self.fetch_config()).context("Failed to initialize transports")?;
        let mut pipeline = Pipeline::new(Arc::new(acquirer), self.pipeline_config());

        if let Some(backend) = self.build_backend()? {
            pipeline = pipeline.with_backend(backend);
        }

        if let Some(url) = &self.crawler.url {
            let mut crawler_config = CrawlerConfig::new(url);
            if let Some(key) = &self.crawler.api_key {
                crawler_config = crawler_config.with_api_key(key);
            }
            let crawler = HttpCrawler::new(crawler_config).context("Failed to initialize crawler client")?;
            pipeline = pipeline.with_crawler(Arc::new(crawler));
        }

        if let Some(dir) = &self.persona_dir {
            let personas = PersonaRegistry::load_with_overrides(dir)
                .with_context(|| format!("Failed to load personas from {}", dir.display()))?;
            pipeline = pipeline.with_personas(personas);
        }

        Ok(pipeline)
    }
}
