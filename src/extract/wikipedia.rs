//! Wikipedia article extractor.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::dom::{
    collect_links, document_title, element_text, extract_description, select_first, NoiseFilter,
};
use super::markdown::MarkdownConverter;
use super::{ExtractError, PageContent};

/// MediaWiki chrome inside the article body.
const NOISE_CLASSES: &[&str] = &[
    "mw-editsection",
    "mw-empty-elt",
    "mw-jump-link",
    "mw-references-wrap",
    "hatnote",
    "shortdescription",
    "infobox",
    "navbox",
    "navbox-styles",
    "vertical-navbox",
    "sidebar",
    "metadata",
    "ambox",
    "ombox",
    "messagebox",
    "toc",
    "reference",
    "reflist",
    "references",
    "refbegin",
    "catlinks",
    "printfooter",
    "noprint",
];

const NOISE_IDS: &[&str] = &["toc", "catlinks", "siteSub", "contentSub", "jump-to-nav"];

const FILTER: NoiseFilter = NoiseFilter::with_extras(NOISE_CLASSES, NOISE_IDS);

/// Namespaces that never hold articles.
const EXCLUDED_NAMESPACES: &[&str] = &[
    "File:",
    "Wikipedia:",
    "Template:",
    "Template_talk:",
    "Help:",
    "Category:",
    "Portal:",
    "Special:",
    "Talk:",
];

static TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*Wikipedia.*$").unwrap());

pub(super) fn can_handle(url: &Url) -> bool {
    url.host_str().is_some_and(|h| {
        h.eq_ignore_ascii_case("wikipedia.org")
            || h.to_ascii_lowercase().ends_with(".wikipedia.org")
    })
}

pub(super) fn parse(html: &Html, base: &Url) -> Result<PageContent, ExtractError> {
    let region = select_first(html, "#mw-content-text", &FILTER)
        .ok_or_else(|| ExtractError::NoContent("Could not find main content".to_string()))?;

    let title = select_first(html, "#firstHeading", &FILTER)
        .map(|h| element_text(h, &FILTER))
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document_title(html).map(|t| TITLE_SUFFIX.replace(&t, "").trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Wikipedia Article".to_string());

    let description = extract_description(html, region, ".mw-parser-output > p", &FILTER);
    let main_content = MarkdownConverter::new(&FILTER, "text")
        .with_base(base)
        .convert(region);
    let links = collect_links(region, base, &FILTER, is_article_link);

    Ok(PageContent {
        title,
        description,
        main_content,
        links,
    })
}

fn is_article_link(url: &Url) -> bool {
    if !can_handle(url) {
        return false;
    }
    let Some(page) = url.path().strip_prefix("/wiki/") else {
        return false;
    };
    let page = page.replace("%3A", ":").replace("%3a", ":");
    !page.is_empty() && !EXCLUDED_NAMESPACES.iter().any(|ns| page.starts_with(ns))
}
