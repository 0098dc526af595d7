//! WebScout Runtime
//!
//! Ties the stages together:
//! - **Pipeline**: per-URL Acquiring -> Extracting -> Agenting / PartialFallback
//! - **Discovery**: multi-page contact, product and asset harvesting
//! - **Config**: optional TOML runtime configuration

pub mod config;
pub mod discovery;
pub mod pipeline;
pub mod result;

pub use config::*;
pub use discovery::*;
pub use pipeline::*;
pub use result::*;
