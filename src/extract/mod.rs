//! Page extraction: extractor dispatch, main-content isolation, markdown
//! conversion and image discovery.
//!
//! [`Extractor::select`] picks the site-specific variant for a URL, falling
//! back to [`Extractor::General`]. Parsing is synchronous and never holds the
//! DOM across an await point.

pub mod dom;
mod general;
pub mod images;
pub mod markdown;
mod python_docs;
mod wikipedia;

use std::time::Duration;

use chrono::Utc;
use scraper::Html;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::models::{
    DiscoveredLink, ExtractionOptions, ExtractionResult, ScrapedImage, ScrapedRecord, META_DOMAIN,
    META_EXTRACTION_DATE, META_EXTRACTION_METHOD, META_SOURCE,
};
use crate::scrapers::{FetchError, PageFetcher};

pub use general::strip_site_suffix;

/// Errors from extracting a single page.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No content extracted: {0}")]
    NoContent(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ExtractError {
    /// Whether the failure came from a fetch that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Fetch(e) if e.is_transient())
    }
}

/// What an extractor pulls out of one HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub title: String,
    pub description: String,
    /// Markdown of the main content region.
    pub main_content: String,
    /// Outbound links from the main content region.
    pub links: Vec<DiscoveredLink>,
}

/// Extractor variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Wikipedia,
    PythonDocs,
    General,
}

impl Extractor {
    /// Site-specific extractors, most specific first.
    const SITE_SPECIFIC: [Extractor; 2] = [Extractor::Wikipedia, Extractor::PythonDocs];

    /// Pick the extractor for a URL. [`Extractor::General`] handles anything
    /// the site-specific variants do not.
    pub fn select(url: &Url) -> Self {
        Self::SITE_SPECIFIC
            .into_iter()
            .find(|e| e.can_handle(url))
            .unwrap_or(Extractor::General)
    }

    /// Like [`Extractor::select`] for an unparsed URL.
    pub fn for_url(url: &str) -> Self {
        Url::parse(url)
            .map(|u| Self::select(&u))
            .unwrap_or(Extractor::General)
    }

    pub fn can_handle(&self, url: &Url) -> bool {
        match self {
            Extractor::Wikipedia => wikipedia::can_handle(url),
            Extractor::PythonDocs => python_docs::can_handle(url),
            Extractor::General => true,
        }
    }

    /// Name recorded as the `source` metadata entry.
    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Wikipedia => "wikipedia",
            Extractor::PythonDocs => "python_docs",
            Extractor::General => "general",
        }
    }

    /// Extract title, description, markdown and links from an HTML document.
    ///
    /// `topic_words` steer region selection for the generic extractor.
    pub fn parse(
        &self,
        base: &Url,
        html: &str,
        topic_words: &[String],
    ) -> Result<PageContent, ExtractError> {
        let document = Html::parse_document(html);
        self.parse_document(&document, base, topic_words)
    }

    fn parse_document(
        &self,
        document: &Html,
        base: &Url,
        topic_words: &[String],
    ) -> Result<PageContent, ExtractError> {
        let content = match self {
            Extractor::Wikipedia => wikipedia::parse(document, base)?,
            Extractor::PythonDocs => python_docs::parse(document, base),
            Extractor::General => general::parse(document, base, topic_words),
        };
        if content.main_content.trim().is_empty() {
            return Err(ExtractError::NoContent(format!(
                "empty main content at {}",
                base
            )));
        }
        Ok(content)
    }

    /// Parse a fetched body and collect image candidates in one pass.
    fn parse_page(
        &self,
        body: &str,
        base: &Url,
        topic_words: &[String],
        options: &ExtractionOptions,
    ) -> Result<(PageContent, Vec<ScrapedImage>), ExtractError> {
        let document = Html::parse_document(body);
        let content = self.parse_document(&document, base, topic_words)?;
        let images = if options.include_images {
            images::collect_candidates(&document, base, options.max_images, options.min_image_size)
        } else {
            Vec::new()
        };
        Ok((content, images))
    }

    /// Fetch and extract one page.
    ///
    /// Returns the record and its outbound links. The fetch races `cancel`.
    pub async fn fetch_and_extract<F>(
        &self,
        fetcher: &F,
        url: &str,
        options: &ExtractionOptions,
        topic_words: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(ScrapedRecord, Vec<DiscoveredLink>), ExtractError>
    where
        F: PageFetcher + ?Sized,
    {
        let requested =
            Url::parse(url).map_err(|e| ExtractError::InvalidUrl(format!("{url}: {e}")))?;

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
            res = fetcher.fetch(url, timeout) => res?,
        };

        if let Some(mime) = page.mime_type() {
            if !mime.contains("html") {
                return Err(ExtractError::NoContent(format!(
                    "unsupported content type {}",
                    mime
                )));
            }
        }

        let base = Url::parse(&page.final_url).unwrap_or(requested);
        let (content, mut images) = self.parse_page(&page.text(), &base, topic_words, options)?;
        debug!(
            "Extracted {} with {} extractor: {} chars, {} links, {} images",
            url,
            self.name(),
            content.main_content.len(),
            content.links.len(),
            images.len()
        );

        if let Some(dir) = &options.image_dir {
            images = images::download_images(fetcher, images, dir, timeout, cancel).await;
        }

        let mut record = ScrapedRecord::new(url, content.title)
            .with_description(content.description)
            .with_content(content.main_content);
        record.images = images;
        record.set_meta(META_SOURCE, self.name());
        record.set_meta(META_DOMAIN, base.host_str().unwrap_or_default());
        record.set_meta(META_EXTRACTION_DATE, Utc::now().to_rfc3339());
        record.set_meta(META_EXTRACTION_METHOD, "heuristic");

        Ok((record, content.links))
    }

    /// Fetch and extract one page, reporting failure as a value.
    pub async fn extract<F>(
        &self,
        fetcher: &F,
        url: &str,
        options: &ExtractionOptions,
        topic_words: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ExtractionResult
    where
        F: PageFetcher + ?Sized,
    {
        match self
            .fetch_and_extract(fetcher, url, options, topic_words, timeout, cancel)
            .await
        {
            Ok((record, links)) => ExtractionResult::succeeded(record, links),
            Err(e) => ExtractionResult::failed(e.to_string()),
        }
    }
}
