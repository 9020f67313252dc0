//! Generic extractor for arbitrary pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::dom::{
    collect_links, document_title, element_text, extract_description, find_main_region, same_host,
    select_first, select_first_in, NoiseFilter,
};
use super::markdown::MarkdownConverter;
use super::PageContent;

const REGION_CANDIDATES: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    "#content",
    ".content",
    "#main",
    ".main",
    ".article",
    ".post",
    ".entry",
    ".blog-post",
];

const FALLBACK_TITLE: &str = "Web Page";

static SITE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s+-\s+Wikipedia|\s*—\s*Python).*$").unwrap()
});

/// Remove known site suffixes from a document title.
pub fn strip_site_suffix(title: &str) -> String {
    SITE_SUFFIX.replace(title, "").trim().to_string()
}

pub(super) fn parse(html: &Html, base: &Url, topic_words: &[String]) -> PageContent {
    let filter = NoiseFilter::generic();
    let region = find_main_region(html, REGION_CANDIDATES, topic_words, &filter);

    let title = select_first_in(region, "h1", &filter)
        .or_else(|| select_first(html, "article h1, .content h1", &filter))
        .or_else(|| select_first(html, "h1", &filter))
        .map(|h| element_text(h, &filter))
        .filter(|t| !t.is_empty())
        .or_else(|| document_title(html).map(|t| strip_site_suffix(&t)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    let description = extract_description(html, region, "p", &filter);
    let main_content = MarkdownConverter::new(&filter, "text")
        .with_base(base)
        .convert(region);
    let links = collect_links(region, base, &filter, |u| same_host(u, base));

    PageContent {
        title,
        description,
        main_content,
        links,
    }
}
