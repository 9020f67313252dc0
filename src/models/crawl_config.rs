//! Crawl configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Per-page extraction options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    /// Collect images from each page.
    pub include_images: bool,
    pub max_images: usize,
    /// Minimum declared size in pixels; 0 disables size filtering.
    pub min_image_size: u32,
    /// Download images here when set.
    pub image_dir: Option<PathBuf>,
    /// Hand each record to the LLM enhancer, if one is configured.
    pub enhancement_enabled: bool,
    /// Maximum characters of page content sent to the enhancer.
    pub max_content_chars: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            include_images: false,
            max_images: 20,
            min_image_size: 100,
            image_dir: None,
            enhancement_enabled: false,
            max_content_chars: 12000,
        }
    }
}

/// Retry behaviour for page fetches.
///
/// Only transient fetch errors are retried. The default makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Configuration for a single crawl. Not modified once the crawl starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    /// Links are followed from pages with depth below this; the seed is depth 0.
    pub max_depth: u32,
    /// Upper bound on visited pages, seed included.
    pub max_pages: usize,
    /// Pages fetched concurrently per frontier batch.
    pub max_concurrent: usize,
    pub same_domain_only: bool,
    pub topic: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub extraction: ExtractionOptions,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 0,
            max_pages: 3,
            max_concurrent: 3,
            same_domain_only: true,
            topic: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            extraction: ExtractionOptions::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.topic = if topic.trim().is_empty() {
            None
        } else {
            Some(topic)
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionOptions) -> Self {
        self.extraction = extraction;
        self
    }

    /// Lowercased, deduplicated topic words, in first-seen order.
    pub fn topic_words(&self) -> Vec<String> {
        let mut words: Vec<String> = Vec::new();
        if let Some(topic) = &self.topic {
            for word in topic.to_lowercase().split_whitespace() {
                if !words.iter().any(|w| w == word) {
                    words.push(word.to_string());
                }
            }
        }
        words
    }
}
