//! LLM integration: configuration, HTTP client and the enhancement steps
//! built on the [`LlmEnhancer`] capability.

mod client;
mod config;
mod enhance;

pub use client::{truncate_utf8, LlmClient, LlmError};
pub use config::{LlmConfig, LlmProvider};
pub use enhance::{
    clean_markdown_document, enhance_record, polish_document, try_polish_document,
    EnhancementError, LlmEnhancer,
};
