//! Markdown heading helpers.
//!
//! Lines inside fenced code blocks are never treated as headings, so shell and
//! Python comments survive intact.

use std::sync::LazyLock;

use regex::Regex;

static HEADING_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s+").unwrap());

/// A heading and the markdown beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading line, trimmed, including its `#`s.
    pub heading: String,
    pub level: usize,
    /// Content up to the next heading of the same or a higher level.
    pub content: String,
}

/// Level of an ATX heading line, or `None` for any other line.
pub fn heading_level(line: &str) -> Option<usize> {
    let line = line.trim();
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || !line.contains(' ') {
        return None;
    }
    Some(level)
}

/// Heading text without its `#` prefix, lowercased.
pub fn normalize_heading(heading: &str) -> String {
    HEADING_PREFIX
        .replace(heading.trim(), "")
        .trim()
        .to_lowercase()
}

/// Heading text without any `#` characters.
pub fn clean_heading(heading: &str) -> String {
    heading.replace('#', "").trim().to_string()
}

/// Classify each line of `markdown` as a heading level or body text.
fn classify(markdown: &str) -> Vec<(&str, Option<usize>)> {
    let mut in_fence = false;
    markdown
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return (line, None);
            }
            if in_fence {
                (line, None)
            } else {
                (line, heading_level(line))
            }
        })
        .collect()
}

/// All heading lines, trimmed, in document order.
pub fn extract_headings(markdown: &str) -> Vec<String> {
    classify(markdown)
        .into_iter()
        .filter(|(_, level)| level.is_some())
        .map(|(line, _)| line.trim().to_string())
        .collect()
}

/// Every heading with the content that belongs to it.
///
/// A section runs until the next heading of the same or a higher level, so a
/// level-2 section includes its level-3 subsections.
pub fn sections(markdown: &str) -> Vec<Section> {
    let lines = classify(markdown);
    let mut out = Vec::new();
    for (idx, (line, level)) in lines.iter().enumerate() {
        let Some(level) = *level else { continue };
        let end = lines[idx + 1..]
            .iter()
            .position(|(_, l)| l.is_some_and(|l| l <= level))
            .map_or(lines.len(), |p| idx + 1 + p);
        let content = lines[idx + 1..end]
            .iter()
            .map(|(l, _)| *l)
            .collect::<Vec<_>>()
            .join("\n");
        out.push(Section {
            heading: line.trim().to_string(),
            level,
            content: content.trim().to_string(),
        });
    }
    out
}
