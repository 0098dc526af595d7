//! Agent Executor
//!
//! Bounded ReAct loop: each iteration builds a prompt from the task, the
//! stage-1 page, the extraction attempt, the scratchpad and every other
//! accumulated page, asks the model for one `{thinking, action}` step and
//! executes it. The loop ends on a non-empty `complete`, on a fatal LLM
//! error, or when iterations run out. An empty `complete` and exhaustion
//! both go through forced synthesis, which never yields empty text.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use scout_core::{truncate_chars, AcquiredContent};

use crate::{
    estimate_call_cost, format_cost, parse_response, AgentAction, AgentSettings, AgentTools, ContentStore,
    ExtractionAttempt, LlmError, ParsedResponse, PersonaRegistry, SharedBackend, ToolCall, AGENT_PERSONA,
    SYNTHESIS_PERSONA,
};

/// Returned when forced synthesis has nothing at all to work with
pub const NO_CONTENT_ANSWER: &str = "No content could be gathered for this task.";

/// How an agent run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    /// The model called `complete` with an answer
    Completed,
    /// Iterations ran out or `complete` was empty; answer synthesized
    Forced,
    /// Unrecoverable error
    Failed,
}

/// One iteration's record
#[derive(Debug, Clone, Serialize)]
pub struct ScratchpadEntry {
    pub iteration: usize,
    pub thinking: String,
    pub action: AgentAction,
    pub result: Option<String>,
}

/// Final output of an agent run
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub success: bool,
    /// Non-empty when `success`
    pub text: String,
    pub iterations: usize,
    pub llm_calls: usize,
    /// URLs in the accumulated-content map, in acquisition order
    pub sources: Vec<String>,
    pub estimated_cost: String,
    pub error: Option<String>,
    pub completion: CompletionKind,
    #[serde(skip)]
    pub scratchpad: Vec<ScratchpadEntry>,
}

/// Mutable state of one run; never shared between runs
struct RunState {
    store: ContentStore,
    scratchpad: Vec<ScratchpadEntry>,
    llm_calls: usize,
    cost: f64,
}

impl RunState {
    fn finish(self, completion: CompletionKind, text: String, iterations: usize, error: Option<String>) -> AgentResult {
        AgentResult {
            success: completion != CompletionKind::Failed,
            text,
            iterations,
            llm_calls: self.llm_calls,
            sources: self.store.sources(),
            estimated_cost: format_cost(self.cost),
            error,
            completion,
            scratchpad: self.scratchpad,
        }
    }
}

/// ReAct agent executor
pub struct AgentExecutor {
    backend: SharedBackend,
    tools: AgentTools,
    personas: Arc<PersonaRegistry>,
    settings: AgentSettings,
}

impl AgentExecutor {
    pub fn new(backend: SharedBackend, tools: AgentTools, settings: AgentSettings) -> Self {
        Self {
            backend,
            tools,
            personas: Arc::new(PersonaRegistry::load_embedded()),
            settings,
        }
    }

    pub fn with_personas(mut self, personas: Arc<PersonaRegistry>) -> Self {
        self.personas = personas;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Run the loop for `task`, seeded with the stage-1 page and extraction
    pub async fn run(&self, task: &str, initial: &AcquiredContent, extraction: &ExtractionAttempt) -> AgentResult {
        let max = self.settings.max_iterations.max(1);
        let mut state = RunState {
            store: ContentStore::new(),
            scratchpad: Vec::new(),
            llm_calls: 0,
            cost: 0.0,
        };
        if initial.success {
            state.store.insert(Arc::new(initial.clone()));
        }

        info!("[{}] Agent starting on {} (max {} iterations)", self.settings.id, initial.url, max);

        for iteration in 1..=max {
            let prompt = self.build_prompt(task, iteration, max, initial, extraction, &state);
            let system = self.personas.system_prompt(AGENT_PERSONA);

            let raw = match self.call_llm(system, &prompt, &mut state).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("[{}] LLM call failed on iteration {}: {}", self.settings.id, iteration, e);
                    return state.finish(CompletionKind::Failed, String::new(), iteration, Some(e.to_string()));
                }
            };

            let step = match parse_response(&raw) {
                ParsedResponse::Parsed(step) => step,
                ParsedResponse::Unparseable { reason } => {
                    debug!("[{}] Iteration {}: {}", self.settings.id, iteration, reason);
                    self.record(&mut state, iteration, "", AgentAction::new("none"), Some(format!("Error: {}", reason)));
                    continue;
                }
            };

            let call = match ToolCall::try_from(&step.action) {
                Ok(call) => call,
                Err(e) => {
                    self.record(&mut state, iteration, &step.thinking, step.action, Some(format!("Error: {}", e)));
                    continue;
                }
            };

            debug!("[{}] Iteration {}: {}", self.settings.id, iteration, call.name());

            if let ToolCall::Complete { result } = &call {
                if !result.trim().is_empty() {
                    info!("[{}] Completed after {} iteration(s)", self.settings.id, iteration);
                    return state.finish(CompletionKind::Completed, result.trim().to_string(), iteration, None);
                }
                warn!("[{}] Empty complete on iteration {}, forcing synthesis", self.settings.id, iteration);
                self.record(
                    &mut state,
                    iteration,
                    &step.thinking,
                    step.action,
                    Some("Error: complete was called with an empty result".to_string()),
                );
                let text = self.force_synthesis(task, extraction, &mut state).await;
                return state.finish(CompletionKind::Forced, text, iteration, None);
            }

            let observation = match self.tools.execute(&call, &mut state.store).await {
                Ok(outcome) => outcome.observation(self.settings.other_page_chars),
                Err(e) => format!("Error: {}", e),
            };
            self.record(&mut state, iteration, &step.thinking, step.action, Some(observation));
        }

        info!("[{}] Iterations exhausted, forcing synthesis", self.settings.id);
        let text = self.force_synthesis(task, extraction, &mut state).await;
        state.finish(CompletionKind::Forced, text, max, None)
    }

    fn record(&self, state: &mut RunState, iteration: usize, thinking: &str, action: AgentAction, result: Option<String>) {
        let limit = self.settings.scratchpad_chars;
        state.scratchpad.push(ScratchpadEntry {
            iteration,
            thinking: truncate_chars(thinking.trim(), limit),
            action,
            result: result.map(|r| truncate_chars(&r, limit * 2)),
        });
    }

    /// One LLM call under the configured deadline; always counted
    async fn call_llm(&self, system: &str, user: &str, state: &mut RunState) -> Result<String, LlmError> {
        state.llm_calls += 1;
        state.cost += estimate_call_cost(self.backend.model_name());

        let timeout = self.settings.llm_timeout_secs;
        tokio::time::timeout(Duration::from_secs(timeout), self.backend.generate(system, user))
            .await
            .map_err(|_| LlmError::Timeout(timeout))?
    }

    fn build_prompt(
        &self,
        task: &str,
        iteration: usize,
        max: usize,
        initial: &AcquiredContent,
        extraction: &ExtractionAttempt,
        state: &RunState,
    ) -> String {
        let mut prompt = format!("TASK: {}\n\nITERATION {} of {}\n", task, iteration, max);
        if iteration == max {
            prompt.push_str(
                "THIS IS THE FINAL ITERATION. You must call complete now with your best answer from the information gathered.\n",
            );
        }

        prompt.push_str(&format!("\n=== STARTING PAGE: {} ===\n", initial.url));
        if initial.success {
            prompt.push_str(&initial.preview(self.settings.preview_chars));
        } else {
            prompt.push_str(&format!(
                "(could not be loaded: {})",
                initial.error.as_deref().unwrap_or("unknown error")
            ));
        }

        prompt.push_str("\n\n=== DETERMINISTIC EXTRACTION ===\n");
        prompt.push_str(&extraction.summary(500));

        if !state.scratchpad.is_empty() {
            prompt.push_str("\n=== SCRATCHPAD ===\n");
            prompt.push_str(&render_scratchpad(&state.scratchpad));
        }

        let initial_key = crate::content_key(&initial.url);
        let others: Vec<_> = state
            .store
            .pages()
            .iter()
            .filter(|p| crate::content_key(&p.url) != initial_key)
            .collect();
        if !others.is_empty() {
            prompt.push_str("\n=== OTHER PAGES SCRAPED ===\n");
            for page in others {
                prompt.push_str(&format!("--- {} ---\n{}\n\n", page.url, page.preview(self.settings.other_page_chars)));
            }
        }

        prompt.push_str("\nRespond with the JSON object only.");
        prompt
    }

    /// One extra call that must produce an answer, with a non-LLM fallback
    async fn force_synthesis(&self, task: &str, extraction: &ExtractionAttempt, state: &mut RunState) -> String {
        let mut prompt = format!("TASK: {}\n\n=== EXTRACTION ===\n{}\n", task, extraction.summary(500));
        if !state.scratchpad.is_empty() {
            prompt.push_str("\n=== RESEARCH NOTES ===\n");
            prompt.push_str(&render_scratchpad(&state.scratchpad));
        }
        prompt.push_str("\n=== PAGES ===\n");
        for page in state.store.pages() {
            prompt.push_str(&format!("--- {} ---\n{}\n\n", page.url, page.preview(self.settings.preview_chars)));
        }
        prompt.push_str("\nWrite the final answer now.");

        let system = self.personas.system_prompt(SYNTHESIS_PERSONA);
        match self.call_llm(system, &prompt, state).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("[{}] Synthesis returned empty text, using page previews", self.settings.id);
                self.fallback_text(state)
            }
            Err(e) => {
                warn!("[{}] Synthesis failed ({}), using page previews", self.settings.id, e);
                self.fallback_text(state)
            }
        }
    }

    fn fallback_text(&self, state: &RunState) -> String {
        let sections: Vec<String> = state
            .store
            .pages()
            .iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| format!("Source: {}\n{}", p.url, p.preview(self.settings.preview_chars)))
            .collect();
        if sections.is_empty() {
            NO_CONTENT_ANSWER.to_string()
        } else {
            sections.join("\n\n")
        }
    }
}

fn render_scratchpad(entries: &[ScratchpadEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let params = serde_json::to_string(&entry.action.params).unwrap_or_default();
        out.push_str(&format!(
            "[Iteration {}]\nThinking: {}\nAction: {} {}\nResult: {}\n\n",
            entry.iteration,
            entry.thinking,
            entry.action.tool,
            truncate_chars(&params, 300),
            entry.result.as_deref().unwrap_or("-"),
        ));
    }
    out
}
