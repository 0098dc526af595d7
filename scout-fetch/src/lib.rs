//! WebScout Fetch Layer
//!
//! Provides page acquisition for the pipeline:
//! - SSRF guard and site identity helpers
//! - Direct HTTP and anti-bot bypass transports
//! - Shared headless browser service
//! - HTML parsing (text, title, links, products, assets)
//! - External crawler client
//! - The cost-ordered acquisition fallback chain

pub mod acquire;
pub mod browser;
pub mod client;
pub mod crawler;
pub mod guard;
pub mod parse;
pub mod transport;

pub use acquire::*;
pub use browser::*;
pub use client::*;
pub use crawler::*;
pub use guard::*;
pub use parse::*;
pub use transport::*;
