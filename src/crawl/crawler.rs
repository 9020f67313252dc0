//! The crawl loop.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::frontier::CrawlFrontier;
use crate::extract::Extractor;
use crate::llm::{enhance_record, LlmEnhancer};
use crate::models::{CrawlerConfig, ExtractionResult, ScrapedRecord};
use crate::relevance::{RelevanceScorer, RELEVANCE_THRESHOLD};
use crate::scrapers::{FetchError, PageFetcher};

/// Reason recorded for pages that fall below the relevance threshold.
pub const NOT_RELEVANT: &str = "content not relevant to topic";

/// A page that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlFailure {
    pub url: String,
    pub depth: u32,
    pub reason: String,
    pub retry_count: u32,
}

/// Outcome of a crawl.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Extracted, relevant records in visit order.
    pub records: Vec<ScrapedRecord>,
    pub failures: Vec<CrawlFailure>,
    pub pages_visited: usize,
    pub cancelled: bool,
}

impl CrawlReport {
    /// True when the crawl extracted nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Breadth-first crawler over a [`PageFetcher`].
pub struct Crawler<F> {
    fetcher: F,
    config: CrawlerConfig,
    enhancer: Option<Arc<dyn LlmEnhancer>>,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, config: CrawlerConfig) -> Self {
        Self {
            fetcher,
            config,
            enhancer: None,
        }
    }

    /// Use `enhancer` for records when enhancement is enabled.
    pub fn with_enhancer(mut self, enhancer: Arc<dyn LlmEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawl from `seed` until the frontier is exhausted, the page budget is
    /// spent or `cancel` fires.
    pub async fn crawl(&self, seed: &str, cancel: &CancellationToken) -> CrawlReport {
        let mut frontier = CrawlFrontier::new(seed, &self.config);
        let topic_words = self.config.topic_words();
        let scorer = self.config.topic.as_deref().map(RelevanceScorer::new);
        let batch_size = self.config.max_concurrent.max(1);
        let mut report = CrawlReport::default();

        info!(
            "Crawling {} (max depth {}, max pages {}, {} concurrent)",
            seed, self.config.max_depth, self.config.max_pages, batch_size
        );

        while !frontier.is_done() {
            if cancel.is_cancelled() {
                break;
            }
            let batch = frontier.next_batch(batch_size);
            if batch.is_empty() {
                break;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|(url, _)| self.visit(url, &topic_words, cancel)),
            )
            .await;

            let mut accepted = Vec::new();
            for ((url, depth), result) in batch.into_iter().zip(results) {
                let ExtractionResult {
                    data,
                    links,
                    error,
                    retry_count,
                    ..
                } = result;
                let Some(mut record) = data else {
                    let reason = error.unwrap_or_else(|| "unknown error".to_string());
                    warn!("Failed to extract {}: {}", url, reason);
                    report.failures.push(CrawlFailure {
                        url,
                        depth,
                        reason,
                        retry_count,
                    });
                    continue;
                };

                let added = frontier.expand(depth, &links);
                debug!("{}: {} links found, {} queued", url, links.len(), added);

                if let Some(scorer) = &scorer {
                    let score = scorer.score(&record.main_content);
                    if score <= RELEVANCE_THRESHOLD {
                        info!("Skipping {} (relevance {:.2})", url, score);
                        report.failures.push(CrawlFailure {
                            url,
                            depth,
                            reason: NOT_RELEVANT.to_string(),
                            retry_count,
                        });
                        continue;
                    }
                    record.set_relevance_score(score);
                }
                accepted.push(record);
            }

            let accepted = self.enhance_all(accepted).await;
            for record in &accepted {
                info!("Extracted {} ({})", record.url, record.title);
            }
            report.records.extend(accepted);
        }

        report.pages_visited = frontier.visited_count();
        report.cancelled = cancel.is_cancelled();
        info!(
            "Crawl finished: {} records, {} failures, {} pages visited{}",
            report.records.len(),
            report.failures.len(),
            report.pages_visited,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Fetch and extract one page, retrying transient fetch errors.
    async fn visit(
        &self,
        url: &str,
        topic_words: &[String],
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        let extractor = Extractor::for_url(url);
        let policy = self.config.retry;
        let mut attempt = 0u32;
        loop {
            let outcome = extractor
                .fetch_and_extract(
                    &self.fetcher,
                    url,
                    &self.config.extraction,
                    topic_words,
                    self.config.request_timeout,
                    cancel,
                )
                .await;
            match outcome {
                Ok((record, links)) => {
                    return ExtractionResult::succeeded(record, links).with_retry_count(attempt)
                }
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt + 1);
                    debug!("Retrying {} in {:?} after: {}", url, delay, e);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return ExtractionResult::failed(FetchError::Cancelled.to_string())
                                .with_retry_count(attempt);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return ExtractionResult::failed(e.to_string()).with_retry_count(attempt),
            }
        }
    }

    async fn enhance_all(&self, records: Vec<ScrapedRecord>) -> Vec<ScrapedRecord> {
        let options = &self.config.extraction;
        let enhancer = match &self.enhancer {
            Some(enhancer) if options.enhancement_enabled => enhancer,
            _ => return records,
        };
        let topic = self.config.topic.as_deref();
        let enhanced = records.into_iter().map(|record| async move {
            match enhance_record(enhancer.as_ref(), &record, topic, options.max_content_chars).await
            {
                Ok(better) => better,
                Err(e) => {
                    warn!("Enhancement failed for {}, keeping extracted record: {}", record.url, e);
                    record
                }
            }
        });
        join_all(enhanced).await
    }
}
