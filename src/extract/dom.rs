//! DOM helpers shared by the extractors.
//!
//! Noise is never removed from the parsed tree. Every traversal consults a
//! [`NoiseFilter`] and skips the subtrees it rejects, so the same document can be
//! inspected with and without filtering (image discovery runs unfiltered).

use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::DiscoveredLink;

/// Maximum links reported per page.
pub const MAX_LINKS: usize = 50;

/// Minimum text length for a candidate main-content region.
pub const MIN_REGION_TEXT: usize = 100;

/// Longest description kept, in characters.
pub const MAX_DESCRIPTION: usize = 500;

const NOISE_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "nav", "header", "footer", "form", "aside", "template",
    "button", "svg",
];

const NOISE_CLASSES: &[&str] = &[
    "navigation",
    "menu",
    "sidebar",
    "footer",
    "header",
    "nav",
    "comments",
    "advertisement",
    "ad",
    "share",
];

const NOISE_IDS: &[&str] = &["comments"];

/// Decides which elements are boilerplate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseFilter {
    extra_classes: &'static [&'static str],
    extra_ids: &'static [&'static str],
}

impl NoiseFilter {
    /// Filter with the generic noise rules only.
    pub const fn generic() -> Self {
        Self {
            extra_classes: &[],
            extra_ids: &[],
        }
    }

    /// Add site-specific classes and ids to the generic rules.
    pub const fn with_extras(
        extra_classes: &'static [&'static str],
        extra_ids: &'static [&'static str],
    ) -> Self {
        Self {
            extra_classes,
            extra_ids,
        }
    }

    pub fn is_noise(&self, element: &Element) -> bool {
        let name = element.name();
        if name == "html" || name == "body" {
            return false;
        }
        if NOISE_TAGS.contains(&name) {
            return true;
        }
        if let Some(id) = element.id() {
            if NOISE_IDS.contains(&id) || self.extra_ids.contains(&id) {
                return true;
            }
        }
        element
            .classes()
            .any(|c| NOISE_CLASSES.contains(&c) || self.extra_classes.contains(&c))
    }

    /// Whether the element or any ancestor is noise.
    pub fn is_within_noise(&self, element: &ElementRef<'_>) -> bool {
        if self.is_noise(element.value()) {
            return true;
        }
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| self.is_noise(a.value()))
    }
}

/// Parse a CSS selector, returning `None` for invalid input.
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// First element matching `css` in the document that is not inside noise.
pub fn select_first<'a>(html: &'a Html, css: &str, filter: &NoiseFilter) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    html.select(&sel).find(|el| !filter.is_within_noise(el))
}

/// First element matching `css` below `scope` that is not inside noise.
pub fn select_first_in<'a>(
    scope: ElementRef<'a>,
    css: &str,
    filter: &NoiseFilter,
) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    scope.select(&sel).find(|el| !filter.is_within_noise(el))
}

/// Concatenate text below `element`, skipping noise.
pub fn collect_text(element: ElementRef<'_>, filter: &NoiseFilter, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                if filter.is_noise(el) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    if matches!(el.name(), "br" | "p" | "div" | "li") {
                        out.push(' ');
                    }
                    collect_text(child_ref, filter, out);
                }
            }
            _ => {}
        }
    }
}

/// Whitespace-collapsed text below `element`, skipping noise.
pub fn element_text(element: ElementRef<'_>, filter: &NoiseFilter) -> String {
    let mut buf = String::new();
    collect_text(element, filter, &mut buf);
    normalize_whitespace(&buf)
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pick the main content region.
///
/// Candidates are tried in order and the first with at least
/// [`MIN_REGION_TEXT`] characters of text wins, provided it mentions every
/// topic word. With topic words, the `div`/`section`/`article` sharing the most
/// distinct words with the topic is tried next. The body, then the document
/// root, are the last resort.
pub fn find_main_region<'a>(
    html: &'a Html,
    candidates: &[&str],
    topic_words: &[String],
    filter: &NoiseFilter,
) -> ElementRef<'a> {
    for css in candidates {
        let Some(sel) = selector(css) else { continue };
        for el in html.select(&sel) {
            if filter.is_within_noise(&el) {
                continue;
            }
            let text = element_text(el, filter);
            if text.chars().count() < MIN_REGION_TEXT {
                continue;
            }
            let lower = text.to_lowercase();
            if topic_words.iter().all(|w| lower.contains(w.as_str())) {
                return el;
            }
        }
    }

    if !topic_words.is_empty() {
        if let Some(el) = best_topic_section(html, topic_words, filter) {
            return el;
        }
    }

    select_first(html, "body", filter).unwrap_or_else(|| html.root_element())
}

fn best_topic_section<'a>(
    html: &'a Html,
    topic_words: &[String],
    filter: &NoiseFilter,
) -> Option<ElementRef<'a>> {
    let sel = selector("div, section, article")?;
    let mut best: Option<(usize, ElementRef<'a>)> = None;
    for el in html.select(&sel) {
        if filter.is_within_noise(&el) {
            continue;
        }
        let text = element_text(el, filter).to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();
        let score = topic_words
            .iter()
            .filter(|tw| words.contains(&tw.as_str()))
            .count();
        if score > 0 && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, el));
        }
    }
    best.map(|(_, el)| el)
}

/// Content of the first `<meta>` whose `attr` equals `value`.
pub fn meta_content(html: &Html, attr: &str, value: &str) -> Option<String> {
    let sel = selector("meta")?;
    html.select(&sel)
        .filter(|m| {
            m.value()
                .attr(attr)
                .is_some_and(|v| v.eq_ignore_ascii_case(value))
        })
        .filter_map(|m| m.value().attr("content"))
        .map(normalize_whitespace)
        .find(|c| !c.is_empty())
}

/// Text of the `<title>` element.
pub fn document_title(html: &Html) -> Option<String> {
    let sel = selector("title")?;
    html.select(&sel)
        .next()
        .map(|t| normalize_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Description cascade: meta description, Open Graph description, first
/// paragraph of the region, then the first 200 characters of region text.
/// Long descriptions are cut back to [`MAX_DESCRIPTION`].
pub fn extract_description(
    html: &Html,
    region: ElementRef<'_>,
    paragraph_css: &str,
    filter: &NoiseFilter,
) -> String {
    let found = meta_content(html, "name", "description")
        .or_else(|| meta_content(html, "property", "og:description"))
        .or_else(|| {
            let sel = selector(paragraph_css)?;
            region
                .select(&sel)
                .filter(|p| !filter.is_within_noise(p))
                .map(|p| element_text(p, filter))
                .find(|text| !text.is_empty())
        });
    match found {
        Some(desc) => cap_description(&desc),
        None => element_text(region, filter).chars().take(200).collect(),
    }
}

/// Cut `text` to at most [`MAX_DESCRIPTION`] characters, ending on the last
/// full sentence when there is one, otherwise on a word boundary.
pub fn cap_description(text: &str) -> String {
    let Some((limit, _)) = text.char_indices().nth(MAX_DESCRIPTION) else {
        return text.to_string();
    };
    let head = &text[..limit];
    let sentence_end = head
        .char_indices()
        .filter(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && text[i + c.len_utf8()..].starts_with(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();
    let end = sentence_end
        .or_else(|| head.rfind(char::is_whitespace))
        .filter(|end| *end > 0)
        .unwrap_or(limit);
    text[..end].trim_end().to_string()
}

/// Resolve `href` against `base`, dropping the fragment.
///
/// Protocol-relative references resolve to https. Non-http(s) schemes,
/// fragment-only and empty references yield `None`.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        base.join(href).ok()?
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Collect outbound links inside `region` accepted by `keep`.
///
/// Links are deduplicated by URL and capped at [`MAX_LINKS`].
pub fn collect_links<F>(
    region: ElementRef<'_>,
    base: &Url,
    filter: &NoiseFilter,
    keep: F,
) -> Vec<DiscoveredLink>
where
    F: Fn(&Url) -> bool,
{
    let mut links: Vec<DiscoveredLink> = Vec::new();
    let Some(sel) = selector("a[href]") else {
        return links;
    };
    for a in region.select(&sel) {
        if links.len() >= MAX_LINKS {
            break;
        }
        if filter.is_within_noise(&a) {
            continue;
        }
        let Some(href) = a.value().attr("href") else { continue };
        let Some(url) = resolve_href(base, href) else { continue };
        if !keep(&url) {
            continue;
        }
        let url = url.to_string();
        if links.iter().any(|l| l.url == url) {
            continue;
        }
        links.push(DiscoveredLink::new(url, element_text(a, filter)));
    }
    links
}

/// Whether two URLs share a host.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}
