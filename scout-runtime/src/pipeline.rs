//! Pipeline Orchestrator
//!
//! Per URL: Acquiring -> Extracting -> Done when extraction satisfies the
//! task, otherwise Agenting (LLM enabled and a backend present) or
//! PartialFallback. URLs in a batch are independent; one URL's failure
//! never aborts the others.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use scout_agents::{
    try_extract, AgentExecutor, AgentSettings, AgentTools, ExtractionAttempt, PageSource, PersonaRegistry,
    SharedBackend,
};
use scout_core::{truncate_chars, AcquiredContent, FALLBACK_TEXT_CHARS};
use scout_fetch::{AcquireOptions, Acquirer, FetchError, LinkCrawler};

use crate::discovery::{self, DiscoveryLimits, DiscoveryReport};
use crate::result::{NonLlmAttempt, PipelineResult, ResultData, ResultMeta};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Allow escalation to the agent
    pub use_llm: bool,
    /// Options for the stage-1 acquisition and agent tool calls
    pub acquire: AcquireOptions,
    pub agent: AgentSettings,
    /// Characters of text returned on the partial fallback path
    pub fallback_text_chars: usize,
    /// URLs processed concurrently in a batch
    pub concurrency: usize,
    pub limits: DiscoveryLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            acquire: AcquireOptions::default(),
            agent: AgentSettings::default(),
            fallback_text_chars: FALLBACK_TEXT_CHARS,
            concurrency: 3,
            limits: DiscoveryLimits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_llm(mut self, enabled: bool) -> Self {
        self.use_llm = enabled;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_agent(mut self, agent: AgentSettings) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_acquire(mut self, acquire: AcquireOptions) -> Self {
        self.acquire = acquire;
        self
    }
}

/// Stages of one URL's run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquiring,
    Extracting,
    Agenting,
    PartialFallback,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquiring => "acquiring",
            Stage::Extracting => "extracting",
            Stage::Agenting => "agenting",
            Stage::PartialFallback => "partial-fallback",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// The three-stage pipeline
pub struct Pipeline {
    acquirer: Arc<Acquirer>,
    backend: Option<SharedBackend>,
    crawler: Option<Arc<dyn LinkCrawler>>,
    personas: Arc<PersonaRegistry>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(acquirer: Arc<Acquirer>, config: PipelineConfig) -> Self {
        Self {
            acquirer,
            backend: None,
            crawler: None,
            personas: Arc::new(PersonaRegistry::load_embedded()),
            config,
        }
    }

    pub fn with_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_crawler(mut self, crawler: Arc<dyn LinkCrawler>) -> Self {
        self.crawler = Some(crawler);
        self
    }

    pub fn with_personas(mut self, personas: PersonaRegistry) -> Self {
        self.personas = Arc::new(personas);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether a URL that fails extraction can escalate to the agent
    pub fn llm_available(&self) -> bool {
        self.config.use_llm && self.backend.is_some()
    }

    /// Run the pipeline for one URL
    pub async fn run_url(&self, url: &str, task: &str) -> PipelineResult {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut meta = ResultMeta::new(&run_id, Utc::now());

        debug!("[{}] {} {}", &run_id[..8], Stage::Acquiring, url);
        let content = self.acquirer.acquire(url, &self.config.acquire).await;
        meta.scrape_method = content.method;

        if !content.success {
            meta.elapsed_ms = started.elapsed().as_millis() as u64;
            warn!("[{}] Acquisition failed for {}", &run_id[..8], url);
            return PipelineResult {
                url: url.to_string(),
                task: task.to_string(),
                success: false,
                data: ResultData::default(),
                meta,
                error: content.error,
            };
        }

        debug!("[{}] {} {}", &run_id[..8], Stage::Extracting, url);
        let attempt = try_extract(&content, task);
        meta.non_llm_attempt = Some(NonLlmAttempt {
            tried: attempt.what_was_tried.clone(),
            reason: attempt.reason.clone(),
        });

        let mut result = if attempt.success {
            info!("[{}] {} {} without LLM: {}", &run_id[..8], Stage::Done, url, attempt.reason);
            self.extraction_result(url, task, &attempt, meta)
        } else if self.llm_available() {
            debug!("[{}] {} {} ({})", &run_id[..8], Stage::Agenting, url, attempt.reason);
            self.agent_result(url, task, &run_id, &content, &attempt, meta).await
        } else {
            info!("[{}] {} {} ({})", &run_id[..8], Stage::PartialFallback, url, attempt.reason);
            self.fallback_result(url, task, &content, &attempt, meta)
        };

        result.meta.elapsed_ms = started.elapsed().as_millis() as u64;
        result
    }

    fn extraction_result(&self, url: &str, task: &str, attempt: &ExtractionAttempt, meta: ResultMeta) -> PipelineResult {
        let data = attempt.data.clone().unwrap_or_default();
        let text = match &data.text {
            Some(text) if !data.has_structured() => text.clone(),
            _ => data.summary(self.config.fallback_text_chars).trim_end().to_string(),
        };

        PipelineResult {
            url: url.to_string(),
            task: task.to_string(),
            success: true,
            data: ResultData {
                text,
                sources: None,
                title: data.title,
                emails: data.emails,
                phones: data.phones,
                products: data.products,
            },
            meta,
            error: None,
        }
    }

    async fn agent_result(
        &self,
        url: &str,
        task: &str,
        run_id: &str,
        content: &AcquiredContent,
        attempt: &ExtractionAttempt,
        mut meta: ResultMeta,
    ) -> PipelineResult {
        let Some(backend) = self.backend.clone() else {
            return self.fallback_result(url, task, content, attempt, meta);
        };

        let source: Arc<dyn PageSource> = self.acquirer.clone();
        let mut tools = AgentTools::new(source).with_options(self.config.acquire.clone());
        if let Some(crawler) = &self.crawler {
            tools = tools.with_crawler(Arc::clone(crawler));
        }

        let settings = self.config.agent.clone().with_id(&run_id[..8]);
        let executor = AgentExecutor::new(backend, tools, settings).with_personas(Arc::clone(&self.personas));
        let outcome = executor.run(task, content, attempt).await;

        meta.used_llm = true;
        meta.iterations = Some(outcome.iterations);
        meta.llm_calls = Some(outcome.llm_calls);
        meta.estimated_cost = Some(outcome.estimated_cost.clone());

        let partial = attempt.data.clone().unwrap_or_default();
        PipelineResult {
            url: url.to_string(),
            task: task.to_string(),
            success: outcome.success,
            data: ResultData {
                text: outcome.text,
                sources: Some(outcome.sources),
                title: partial.title,
                emails: partial.emails,
                phones: partial.phones,
                products: partial.products,
            },
            meta,
            error: outcome.error,
        }
    }

    fn fallback_result(
        &self,
        url: &str,
        task: &str,
        content: &AcquiredContent,
        attempt: &ExtractionAttempt,
        meta: ResultMeta,
    ) -> PipelineResult {
        let partial = attempt.data.clone().unwrap_or_default();
        let raw = partial.text.as_deref().unwrap_or(&content.text);
        let text = truncate_chars(raw, self.config.fallback_text_chars);
        let success = partial.has_structured();

        let error = (!success).then(|| {
            let hint = if self.config.use_llm {
                "configure an LLM backend to handle this task"
            } else {
                "enable LLM use to handle this task"
            };
            format!("Deterministic extraction failed: {}; {}", attempt.reason, hint)
        });

        PipelineResult {
            url: url.to_string(),
            task: task.to_string(),
            success,
            data: ResultData {
                text,
                sources: None,
                title: partial.title,
                emails: partial.emails,
                phones: partial.phones,
                products: partial.products,
            },
            meta,
            error,
        }
    }

    /// Run many URLs, preserving input order; the shared browser is always
    /// released afterwards
    pub async fn run_batch(&self, urls: &[String], task: &str) -> Vec<PipelineResult> {
        info!("Running {} URL(s) with concurrency {}", urls.len(), self.config.concurrency);

        let results: Vec<PipelineResult> = stream::iter(urls.iter())
            .map(|url| self.run_url(url, task))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        self.shutdown().await;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!("Batch done: {}/{} succeeded", succeeded, results.len());
        results
    }

    /// Full-page screenshot through the shared browser
    pub async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.acquirer.screenshot(url).await
    }

    pub async fn discover_contacts(&self, url: &str, task: &str) -> DiscoveryReport {
        discovery::discover_contacts(self.source().as_ref(), self.crawler.as_deref(), url, task, &self.discovery_options()).await
    }

    pub async fn discover_products(&self, url: &str, task: &str) -> DiscoveryReport {
        discovery::discover_products(self.source().as_ref(), self.crawler.as_deref(), url, task, &self.discovery_options()).await
    }

    pub async fn harvest_assets(&self, url: &str, task: &str) -> DiscoveryReport {
        discovery::harvest_assets(self.source().as_ref(), self.crawler.as_deref(), url, task, &self.discovery_options()).await
    }

    fn source(&self) -> Arc<dyn PageSource> {
        self.acquirer.clone()
    }

    fn discovery_options(&self) -> discovery::DiscoveryOptions {
        discovery::DiscoveryOptions {
            limits: self.config.limits.clone(),
            acquire: self.config.acquire.clone(),
        }
    }

    /// Release shared resources (the headless browser)
    pub async fn shutdown(&self) {
        self.acquirer.close_browser().await;
    }
}
