//! Shared helpers for integration tests: an in-memory page fetcher and page builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use cliche::scrapers::{FetchError, FetchedPage, PageFetcher};

/// Serves scripted responses per URL.
///
/// Each URL holds a queue of responses. A fetch pops the front of the queue
/// until a single response is left, which is then served forever. URLs marked
/// as hanging never complete.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<FetchedPage, FetchError>>>>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(url, Ok(FetchedPage::ok(url, "text/html; charset=utf-8", html)))
    }

    pub fn with_bytes(self, url: &str, content_type: &str, body: &[u8]) -> Self {
        self.with_response(url, Ok(FetchedPage::ok(url, content_type, body.to_vec())))
    }

    pub fn with_error(self, url: &str, error: FetchError) -> Self {
        self.with_response(url, Err(error))
    }

    pub fn with_response(self, url: &str, response: Result<FetchedPage, FetchError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// Every URL fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A page whose `<article>` holds `body` paragraphs and `links` as anchors.
pub fn article_page(title: &str, paragraphs: &[&str], links: &[(&str, &str)]) -> String {
    let paragraphs: String = paragraphs.iter().map(|p| format!("<p>{}</p>", p)).collect();
    let links: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{}\">{}</a></li>", href, text))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/nav\">Home</a></nav>\
         <article><h1>{title}</h1>{paragraphs}<ul>{links}</ul></article>\
         <footer>Copyright</footer></body></html>"
    )
}

/// Filler text about Rust, long enough to pass region and relevance checks.
pub const RUST_TEXT: &str = "Rust is a systems programming language focused on safety and speed. \
     Rust programs avoid data races through ownership and borrowing rules.";
