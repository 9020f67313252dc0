//! Multi-source synthesis: merge scraped records on one topic into a single
//! organized markdown document.
//!
//! The merge is deterministic. Records are ranked by relevance, level-2 and
//! level-3 headings are clustered across sources by similarity, and prose is
//! deduplicated sentence by sentence across the whole document.

mod headings;
mod similarity;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::ScrapedRecord;
use crate::relevance::RelevanceScorer;

pub use headings::{
    clean_heading, extract_headings, heading_level, normalize_heading, sections, Section,
};
pub use similarity::ratio;

/// Headings cluster when their similarity exceeds this.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

const OVERVIEW: &str = "Overview";
const MIN_INTRO_DESCRIPTION: usize = 100;
const MIN_INTRO_SENTENCE: usize = 40;
const MIN_SENTENCE: usize = 20;
const MAX_SECTION_SOURCES: usize = 3;
const CONCLUSION_TITLES: usize = 5;

/// One source's contribution to a section.
#[derive(Debug, Clone)]
struct Contribution {
    heading: String,
    content: String,
    url: String,
}

#[derive(Debug)]
struct Group {
    title: String,
    contributions: Vec<Contribution>,
}

/// Merges scraped records about one topic.
pub struct MultiSourceSynthesizer {
    topic: String,
    scorer: RelevanceScorer,
}

impl MultiSourceSynthesizer {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            scorer: RelevanceScorer::new(topic),
        }
    }

    /// Merge `records` into one markdown document.
    pub fn merge(&self, records: &[ScrapedRecord]) -> String {
        if records.is_empty() {
            return format!("# No content available for {}", self.topic);
        }

        let ranked = self.rank(records);
        let title = format!("# Comprehensive Guide: {}", self.topic);
        let intro = introduction(&ranked);
        let groups = self.group_sections(&ranked);
        let order = toc_order(&groups);

        let mut toc = vec!["## Table of Contents".to_string()];
        for (i, idx) in order.iter().enumerate() {
            let heading = &groups[*idx].title;
            toc.push(format!("{}. [{}](#{})", i + 1, heading, slugify(heading)));
        }

        let mut used_sentences: HashSet<String> = HashSet::new();
        let mut body: Vec<String> = Vec::new();
        for idx in &order {
            let group = &groups[*idx];
            body.push(format!("## {} {{#{}}}", group.title, slugify(&group.title)));

            let mut contributions = group.contributions.clone();
            contributions.sort_by(|a, b| {
                self.scorer
                    .score(&b.content)
                    .partial_cmp(&self.scorer.score(&a.content))
                    .unwrap_or(Ordering::Equal)
            });

            let merged = merge_contributions(&contributions, &mut used_sentences);
            if !merged.is_empty() {
                body.push(merged);
            }

            let mut sources: Vec<&str> = Vec::new();
            for c in &contributions {
                if !c.url.is_empty() && !sources.contains(&c.url.as_str()) {
                    sources.push(&c.url);
                }
            }
            if !sources.is_empty() {
                let links: Vec<String> = sources
                    .iter()
                    .take(MAX_SECTION_SOURCES)
                    .enumerate()
                    .map(|(i, url)| format!("[[{}]]({})", i + 1, url))
                    .collect();
                body.push(format!("**Sources:** {}", links.join(" ")));
            }
        }

        if !groups
            .iter()
            .any(|g| g.title.to_lowercase().contains("conclusion"))
        {
            let covered: Vec<&str> = groups
                .iter()
                .take(CONCLUSION_TITLES)
                .map(|g| g.title.as_str())
                .collect();
            body.push("## Conclusion".to_string());
            body.push(format!(
                "This comprehensive guide on {} has covered key aspects including {} and more. \
                 The information presented combines insights from multiple authoritative sources \
                 to provide a thorough understanding of the subject.",
                self.topic,
                covered.join(", ")
            ));
        }

        body.push("## References".to_string());
        let mut seen: HashSet<&str> = HashSet::new();
        let references: Vec<String> = ranked
            .iter()
            .filter(|r| !r.url.is_empty() && seen.insert(r.url.as_str()))
            .map(|r| {
                let title = if r.title.trim().is_empty() {
                    "Untitled Source"
                } else {
                    r.title.trim()
                };
                format!("- [{}]({})", title, r.url)
            })
            .collect();
        if !references.is_empty() {
            body.push(references.join("\n"));
        }

        [title, intro, toc.join("\n"), body.join("\n\n")].join("\n\n")
    }

    /// Records sorted by relevance of content plus description, best first.
    /// Equal scores keep their input order.
    fn rank<'a>(&self, records: &'a [ScrapedRecord]) -> Vec<&'a ScrapedRecord> {
        let mut scored: Vec<(f64, &ScrapedRecord)> = records
            .iter()
            .map(|r| {
                let text = format!("{}{}", r.main_content, r.description);
                (self.scorer.score(&text), r)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.into_iter().map(|(_, r)| r).collect()
    }

    fn group_sections(&self, ranked: &[&ScrapedRecord]) -> Vec<Group> {
        // Normalized heading -> contributions, in first-seen order.
        let mut keys: Vec<String> = Vec::new();
        let mut by_key: HashMap<String, Vec<Contribution>> = HashMap::new();
        for record in ranked {
            for section in sections(&record.main_content) {
                if !(2..=3).contains(&section.level) || section.content.is_empty() {
                    continue;
                }
                let key = normalize_heading(&section.heading);
                let entry = by_key.entry(key.clone()).or_insert_with(|| {
                    keys.push(key);
                    Vec::new()
                });
                entry.push(Contribution {
                    heading: section.heading,
                    content: section.content,
                    url: record.url.clone(),
                });
            }
        }

        let mut groups: Vec<Group> = Vec::new();
        let mut processed: HashSet<String> = HashSet::new();
        let Some(top) = ranked.first() else {
            return groups;
        };

        let top_headings = extract_headings(&top.main_content);
        if top_headings.is_empty() && !top.main_content.trim().is_empty() {
            push_group(
                &mut groups,
                OVERVIEW.to_string(),
                vec![Contribution {
                    heading: OVERVIEW.to_string(),
                    content: top.main_content.clone(),
                    url: top.url.clone(),
                }],
            );
        }

        for heading in top_headings {
            let key = normalize_heading(&heading);
            if processed.contains(&key) || !by_key.contains_key(&key) {
                continue;
            }
            let mut cluster = vec![key.clone()];
            for other in &keys {
                if *other != key
                    && !processed.contains(other)
                    && ratio(&key, other) > SIMILARITY_THRESHOLD
                {
                    cluster.push(other.clone());
                }
            }
            let mut contributions = Vec::new();
            for k in &cluster {
                processed.insert(k.clone());
                if let Some(entries) = by_key.get(k) {
                    contributions.extend(entries.iter().cloned());
                }
            }
            let title = most_common_heading(&contributions);
            push_group(&mut groups, title, contributions);
        }

        for key in &keys {
            if processed.contains(key) {
                continue;
            }
            processed.insert(key.clone());
            let contributions = by_key.get(key).cloned().unwrap_or_default();
            let title = contributions
                .first()
                .map(|c| clean_heading(&c.heading))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Additional Content".to_string());
            push_group(&mut groups, title, contributions);
        }

        groups
    }
}

/// Merge `records` on `topic` into one markdown document.
pub fn merge(records: &[ScrapedRecord], topic: &str) -> String {
    MultiSourceSynthesizer::new(topic).merge(records)
}

/// Lowercase, spaces to hyphens, colons and commas removed.
pub fn slugify(heading: &str) -> String {
    heading
        .to_lowercase()
        .replace(' ', "-")
        .replace([':', ','], "")
}

/// Add a group, folding it into an existing group with the same title.
fn push_group(groups: &mut Vec<Group>, title: String, contributions: Vec<Contribution>) {
    match groups.iter_mut().find(|g| g.title == title) {
        Some(existing) => existing.contributions.extend(contributions),
        None => groups.push(Group {
            title,
            contributions,
        }),
    }
}

/// The literal heading used most often in a cluster; ties go to the first seen.
fn most_common_heading(contributions: &[Contribution]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for c in contributions {
        let heading = clean_heading(&c.heading);
        match counts.iter_mut().find(|(h, _)| *h == heading) {
            Some((_, n)) => *n += 1,
            None => counts.push((heading, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (heading, n) in counts {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((heading, n));
        }
    }
    best.map(|(h, _)| h)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "Content Section".to_string())
}

/// Overview first, the other section titles alphabetically.
fn toc_order(groups: &[Group]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..groups.len())
        .filter(|i| groups[*i].title != OVERVIEW)
        .collect();
    order.sort_by(|a, b| groups[*a].title.cmp(&groups[*b].title));
    if let Some(overview) = groups.iter().position(|g| g.title == OVERVIEW) {
        order.insert(0, overview);
    }
    order
}

fn introduction(ranked: &[&ScrapedRecord]) -> String {
    let mut intro = String::from("## Introduction\n\n");
    let Some(top) = ranked.first() else {
        return intro;
    };
    intro.push_str(&top.description);
    for record in ranked.iter().skip(1).take(2) {
        let desc = &record.description;
        if desc.chars().count() <= MIN_INTRO_DESCRIPTION {
            continue;
        }
        for sentence in split_sentences(desc) {
            if sentence.chars().count() > MIN_INTRO_SENTENCE && !intro.contains(&sentence) {
                intro.push_str("\n\n");
                intro.push_str(&sentence);
            }
        }
    }
    intro
}

/// Split on `.`, trimming each piece and restoring its period.
fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s))
        .collect()
}

/// Split section content into blocks on blank lines, keeping fenced code
/// blocks whole even when they contain blank lines.
fn paragraphs(content: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;
    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if line.trim().is_empty() && !in_fence {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Merge contributions into one section body.
///
/// Code blocks and tables are kept whole and added once. Prose is reduced to
/// sentences of at least 20 characters not used anywhere else in the document.
/// Subheadings are dropped since they have sections of their own.
fn merge_contributions(contributions: &[Contribution], used: &mut HashSet<String>) -> String {
    let mut merged: Vec<String> = Vec::new();
    for contribution in contributions {
        for paragraph in paragraphs(&contribution.content) {
            let trimmed = paragraph.trim();
            let lone_heading = heading_level(trimmed).is_some() && !trimmed.contains('\n');
            if trimmed.is_empty() || lone_heading {
                continue;
            }
            if trimmed.starts_with("```") || trimmed.starts_with('|') {
                if !merged.iter().any(|m| m.contains(trimmed)) {
                    merged.push(trimmed.to_string());
                }
                continue;
            }

            let prose = trimmed.replace('\n', " ");
            let kept: Vec<String> = split_sentences(&prose)
                .into_iter()
                .filter(|s| s.chars().count() >= MIN_SENTENCE)
                .filter(|s| used.insert(s.clone()))
                .collect();
            if !kept.is_empty() {
                merged.push(kept.join(" "));
            }
        }
    }
    merged.join("\n\n")
}
