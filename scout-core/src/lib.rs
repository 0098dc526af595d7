//! WebScout Core - content types and deterministic logic
//!
//! This crate provides the I/O-free primitives:
//! - Acquired content and extracted data types
//! - Task intent detection
//! - Email and phone pattern extraction
//! - Crawl candidate scoring

pub mod content;
pub mod intent;
pub mod patterns;
pub mod scoring;

pub use content::*;
pub use intent::*;
pub use patterns::*;
pub use scoring::*;

/// Characters of page text shown in previews
pub const DEFAULT_PREVIEW_CHARS: usize = 1500;

/// Characters of extracted text returned when no LLM is available
pub const FALLBACK_TEXT_CHARS: usize = 5000;
