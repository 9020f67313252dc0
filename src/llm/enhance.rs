//! Optional LLM polishing of scraped records and merged documents.
//!
//! Both paths fall back to the unenhanced input on any failure.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::client::{truncate_utf8, LlmClient, LlmError};
use crate::extract::markdown::{balance_fences, sanitize_markdown};
use crate::models::{ScrapedRecord, META_EXTRACTION_METHOD};

/// Errors from an enhancement attempt.
#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Unparseable LLM reply: {0}")]
    Unparseable(String),

    #[error("LLM reply not substantial ({new} chars against {old})")]
    NotSubstantial { old: usize, new: usize },
}

/// Something that turns a prompt into text, usually an LLM.
#[async_trait]
pub trait LlmEnhancer: Send + Sync {
    async fn enhance(&self, prompt: &str) -> Result<String, EnhancementError>;
}

#[async_trait]
impl LlmEnhancer for LlmClient {
    async fn enhance(&self, prompt: &str) -> Result<String, EnhancementError> {
        Ok(self.generate(prompt).await?)
    }
}

const RECORD_PROMPT: &str = r#"Improve the following scraped web page about {topic}.

Organize it under clear markdown headings, fix broken formatting and remove navigation debris or repeated text. Keep every fact, code block and table.

Return ONLY a JSON object inside a ```json code block with exactly these keys: "title", "description" (one or two sentences) and "main_content" (markdown).

Title: {title}
Description: {description}

Content:
{content}"#;

const DOCUMENT_PROMPT: &str = r#"You are writing a comprehensive reference document about {topic}.

Below is a draft merged from several web sources. Rewrite it into a well-organized markdown document: keep the section structure, keep all code blocks and tables, remove repetition and smooth the prose. Keep the Sources lines and the References section.

Respond with the markdown document only.

Draft:
{content}"#;

/// Replacement content must be at least this share of the original length.
const SUBSTANTIAL_PERCENT: usize = 80;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").unwrap());

#[derive(Debug, Default, Deserialize)]
struct EnhancedRecord {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    main_content: String,
}

fn record_prompt(record: &ScrapedRecord, topic: Option<&str>, max_chars: usize) -> String {
    RECORD_PROMPT
        .replace("{topic}", topic.unwrap_or("general information"))
        .replace("{title}", &record.title)
        .replace("{description}", &record.description)
        .replace("{content}", truncate_utf8(&record.main_content, max_chars))
}

fn parse_enhanced(reply: &str) -> Option<EnhancedRecord> {
    if let Some(caps) = JSON_BLOCK.captures(reply) {
        if let Ok(parsed) = serde_json::from_str(&caps[1]) {
            return Some(parsed);
        }
    }
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &reply[start..=end];
    if !candidate.contains("\"main_content\"") {
        return None;
    }
    serde_json::from_str(candidate).ok()
}

fn preview(reply: &str) -> String {
    let cut = truncate_utf8(reply.trim(), 80);
    if cut.len() < reply.trim().len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}

fn apply_enhancement(
    record: &ScrapedRecord,
    enhanced: EnhancedRecord,
) -> Result<ScrapedRecord, EnhancementError> {
    let mut out = record.clone();
    let mut changed = false;

    let title = enhanced.title.trim();
    if !title.is_empty() {
        out.title = title.to_string();
        changed = true;
    }
    let description = enhanced.description.trim();
    if !description.is_empty() {
        out.description = description.to_string();
        changed = true;
    }

    let content = enhanced.main_content.trim();
    let old_len = record.main_content.chars().count();
    let new_len = content.chars().count();
    if !content.is_empty() && new_len * 100 >= old_len * SUBSTANTIAL_PERCENT {
        out.main_content = sanitize_markdown(content);
        changed = true;
    } else if !content.is_empty() {
        debug!(
            "Keeping original content of {}: enhanced {} chars against {}",
            record.url, new_len, old_len
        );
    }

    if !changed {
        return Err(EnhancementError::NotSubstantial {
            old: old_len,
            new: new_len,
        });
    }
    out.set_meta(META_EXTRACTION_METHOD, "llm_enhanced");
    Ok(out)
}

/// Ask the enhancer to restructure one record.
///
/// Non-empty title and description replace the record's. The content is
/// replaced only when it keeps at least 80% of the original length.
pub async fn enhance_record<E>(
    enhancer: &E,
    record: &ScrapedRecord,
    topic: Option<&str>,
    max_chars: usize,
) -> Result<ScrapedRecord, EnhancementError>
where
    E: LlmEnhancer + ?Sized,
{
    let prompt = record_prompt(record, topic, max_chars);
    let reply = enhancer.enhance(&prompt).await?;
    let enhanced =
        parse_enhanced(&reply).ok_or_else(|| EnhancementError::Unparseable(preview(&reply)))?;
    apply_enhancement(record, enhanced)
}

/// Strip a wrapping ```markdown fence from an LLM reply and close any
/// fence left open.
pub fn clean_markdown_document(reply: &str) -> String {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let (lang, body) = rest.split_once('\n').unwrap_or((rest, ""));
        if matches!(lang.trim().to_lowercase().as_str(), "markdown" | "md") {
            text = body.trim_end();
            if let Some(inner) = text.strip_suffix("```") {
                text = inner.trim_end();
            }
        }
    }
    balance_fences(text.trim())
}

/// Rewrite a merged document through the enhancer.
pub async fn try_polish_document<E>(
    enhancer: &E,
    merged: &str,
    topic: &str,
    max_chars: usize,
) -> Result<String, EnhancementError>
where
    E: LlmEnhancer + ?Sized,
{
    let prompt = DOCUMENT_PROMPT
        .replace("{topic}", topic)
        .replace("{content}", truncate_utf8(merged, max_chars));
    let reply = enhancer.enhance(&prompt).await?;
    let cleaned = clean_markdown_document(&reply);
    if cleaned.is_empty() {
        return Err(EnhancementError::NotSubstantial {
            old: merged.chars().count(),
            new: 0,
        });
    }
    Ok(cleaned)
}

/// Like [`try_polish_document`], returning `merged` unchanged on failure.
pub async fn polish_document<E>(enhancer: &E, merged: &str, topic: &str, max_chars: usize) -> String
where
    E: LlmEnhancer + ?Sized,
{
    match try_polish_document(enhancer, merged, topic, max_chars).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Document polishing failed, keeping merged document: {}", e);
            merged.to_string()
        }
    }
}
