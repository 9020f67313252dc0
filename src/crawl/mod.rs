//! Breadth-first crawling: the frontier and the async crawl loop.

mod crawler;
mod frontier;

pub use crawler::{CrawlFailure, CrawlReport, Crawler, NOT_RELEVANT};
pub use frontier::CrawlFrontier;
