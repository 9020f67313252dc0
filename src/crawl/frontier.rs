//! Breadth-first crawl frontier.

use std::collections::{HashSet, VecDeque};

use url::Url;

use crate::models::{CrawlerConfig, DiscoveredLink};

/// Queue of `(url, depth)` pairs plus the visited set for one crawl.
///
/// A URL is marked visited when it is dequeued, before it is fetched, so a
/// page is never processed twice even when extraction fails. The frontier
/// never hands out more than `max_pages` URLs.
#[derive(Debug)]
pub struct CrawlFrontier {
    max_depth: u32,
    max_pages: usize,
    same_domain_only: bool,
    topic_words: Vec<String>,
    seed_host: Option<String>,
    visited: HashSet<String>,
    visit_order: Vec<String>,
    queue: VecDeque<(String, u32)>,
    queued: HashSet<String>,
}

/// Canonical form used for visited/queued bookkeeping: fragment removed.
fn canonical(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url.to_string(),
    }
}

impl CrawlFrontier {
    /// Create a frontier seeded with `seed` at depth 0.
    pub fn new(seed: &str, config: &CrawlerConfig) -> Self {
        let seed = canonical(seed);
        let seed_host = Url::parse(&seed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

        let mut frontier = Self {
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            same_domain_only: config.same_domain_only,
            topic_words: config.topic_words(),
            seed_host,
            visited: HashSet::new(),
            visit_order: Vec::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
        };
        if frontier.max_pages > 0 {
            frontier.queued.insert(seed.clone());
            frontier.queue.push_back((seed, 0));
        }
        frontier
    }

    /// Dequeue the next URL and mark it visited.
    pub fn next(&mut self) -> Option<(String, u32)> {
        if self.visited.len() >= self.max_pages {
            return None;
        }
        let (url, depth) = self.queue.pop_front()?;
        self.queued.remove(&url);
        self.visited.insert(url.clone());
        self.visit_order.push(url.clone());
        Some((url, depth))
    }

    /// Dequeue up to `n` URLs, marking each visited.
    pub fn next_batch(&mut self, n: usize) -> Vec<(String, u32)> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.next() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }

    /// Enqueue links found on a page at `depth`.
    ///
    /// Nothing is enqueued once `depth` reaches `max_depth`. Links are filtered
    /// by host (when restricted to the seed's domain), then by topic (any topic
    /// word in the URL or anchor text), then against visited and queued URLs.
    /// Enqueuing stops when visited plus queued would exceed `max_pages`.
    /// Returns the number of links enqueued.
    pub fn expand(&mut self, depth: u32, links: &[DiscoveredLink]) -> usize {
        if depth >= self.max_depth {
            return 0;
        }
        let mut added = 0;
        for link in links {
            if self.visited.len() + self.queue.len() >= self.max_pages {
                break;
            }
            let url = canonical(&link.url);
            if !self.accepts(&url, &link.text) {
                continue;
            }
            if self.visited.contains(&url) || self.queued.contains(&url) {
                continue;
            }
            self.queued.insert(url.clone());
            self.queue.push_back((url, depth + 1));
            added += 1;
        }
        added
    }

    fn accepts(&self, url: &str, text: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if self.same_domain_only {
            let host = parsed.host_str().map(str::to_ascii_lowercase);
            if host.is_none() || host != self.seed_host {
                return false;
            }
        }
        if !self.topic_words.is_empty() {
            let url_lower = url.to_lowercase();
            let text_lower = text.to_lowercase();
            if !self
                .topic_words
                .iter()
                .any(|w| url_lower.contains(w.as_str()) || text_lower.contains(w.as_str()))
            {
                return false;
            }
        }
        true
    }

    /// Whether no further URL will be handed out.
    pub fn is_done(&self) -> bool {
        self.queue.is_empty() || self.visited.len() >= self.max_pages
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&canonical(url))
    }

    /// Visited URLs in dequeue order.
    pub fn visited(&self) -> &[String] {
        &self.visit_order
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}
