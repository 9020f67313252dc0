//! cliche - web scraping and multi-source document synthesis.
//!
//! Pages are fetched through a [`scrapers::PageFetcher`], turned into
//! [`models::ScrapedRecord`]s by the [`extract::Extractor`] chosen for their
//! site, crawled breadth-first by [`crawl::Crawler`], and merged into a single
//! markdown guide by [`synthesis::MultiSourceSynthesizer`].

pub mod config;
pub mod crawl;
pub mod extract;
pub mod llm;
pub mod models;
pub mod relevance;
pub mod scrapers;
pub mod storage;
pub mod synthesis;
