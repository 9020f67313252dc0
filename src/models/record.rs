//! Scraped content records.
//!
//! A [`ScrapedRecord`] is the unit persisted by the scrape command and consumed
//! by document generation. Field names serialize in snake_case so files written
//! by older versions of the tool load unchanged.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata key holding the extractor name.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the page host.
pub const META_DOMAIN: &str = "domain";
/// Metadata key holding the RFC 3339 extraction time.
pub const META_EXTRACTION_DATE: &str = "extraction_date";
/// Metadata key holding how the content was produced.
pub const META_EXTRACTION_METHOD: &str = "extraction_method";
/// Metadata key holding the topic relevance score, when a topic was given.
pub const META_RELEVANCE_SCORE: &str = "relevance_score";

/// An image referenced by a scraped page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedImage {
    /// Absolute image URL.
    pub url: String,
    /// Where the image was saved, once downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Order of appearance on the page.
    #[serde(default)]
    pub position_index: usize,
    /// Page the image was found on.
    #[serde(default)]
    pub source_url: String,
    /// Content-type subtype or extension, known after download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl ScrapedImage {
    pub fn new(
        url: impl Into<String>,
        source_url: impl Into<String>,
        position_index: usize,
    ) -> Self {
        Self {
            url: url.into(),
            local_path: None,
            alt_text: String::new(),
            caption: None,
            width: None,
            height: None,
            position_index,
            source_url: source_url.into(),
            file_type: None,
        }
    }

    /// Whether the image has been saved locally.
    pub fn is_downloaded(&self) -> bool {
        self.local_path.is_some()
    }
}

/// Content extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Markdown body with balanced code fences.
    #[serde(default)]
    pub main_content: String,
    #[serde(default)]
    pub images: Vec<ScrapedImage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ScrapedRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: String::new(),
            main_content: String::new(),
            images: Vec::new(),
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.main_content = content.into();
        self
    }

    /// Set a string metadata entry.
    pub fn set_meta(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    /// Get a string metadata entry.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Relevance score recorded by the crawler, if any.
    pub fn relevance_score(&self) -> Option<f64> {
        self.metadata
            .get(META_RELEVANCE_SCORE)
            .and_then(|v| v.as_f64())
    }

    pub fn set_relevance_score(&mut self, score: f64) {
        if let Some(n) = serde_json::Number::from_f64(score) {
            self.metadata
                .insert(META_RELEVANCE_SCORE.to_string(), serde_json::Value::Number(n));
        }
    }
}

/// An outbound link found in a page's main content region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredLink {
    /// Absolute URL without fragment.
    pub url: String,
    /// Anchor text, whitespace-collapsed.
    #[serde(default)]
    pub text: String,
}

impl DiscoveredLink {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

/// Outcome of extracting one URL.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub success: bool,
    /// Present iff `success`.
    pub data: Option<ScrapedRecord>,
    pub links: Vec<DiscoveredLink>,
    /// Present iff not `success`.
    pub error: Option<String>,
    pub retry_count: u32,
}

impl ExtractionResult {
    pub fn succeeded(record: ScrapedRecord, links: Vec<DiscoveredLink>) -> Self {
        Self {
            success: true,
            data: Some(record),
            links,
            error: None,
            retry_count: 0,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            links: Vec::new(),
            error: Some(error.into()),
            retry_count: 0,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}
