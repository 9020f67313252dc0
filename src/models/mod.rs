//! Data models for scraped content and crawl configuration.

mod crawl_config;
mod record;

pub use crawl_config::{CrawlerConfig, ExtractionOptions, RetryPolicy};
pub use record::{
    DiscoveredLink, ExtractionResult, ScrapedImage, ScrapedRecord, META_DOMAIN,
    META_EXTRACTION_DATE, META_EXTRACTION_METHOD, META_RELEVANCE_SCORE, META_SOURCE,
};
