//! WebScout Agents
//!
//! The LLM-facing half of the pipeline:
//! - **Extractor**: deterministic, intent-driven extraction (no LLM)
//! - **Backends**: OpenAI-compatible and Anthropic chat clients
//! - **Tools**: `scrape_url`, `crawl_links` and `complete`
//! - **Response parser**: strict JSON first, regex salvage second
//! - **Executor**: the bounded ReAct loop with forced synthesis
//!
//! ## Prompts
//!
//! The agent and synthesis system prompts are TOML persona files in
//! `prompts/`, embedded at compile time. See [`persona::PersonaRegistry`].

pub mod backend;
pub mod executor;
pub mod extractor;
pub mod persona;
pub mod pricing;
pub mod response;
pub mod tools;
pub mod traits;

pub use backend::*;
pub use executor::*;
pub use extractor::*;
pub use persona::*;
pub use pricing::*;
pub use response::*;
pub use tools::*;
pub use traits::*;
