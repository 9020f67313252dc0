//! Record persistence round-trips, from crawl output to a written document.

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use cliche::crawl::Crawler;
use cliche::models::{CrawlerConfig, ScrapedImage, ScrapedRecord};
use cliche::storage::{load_records, save_records, RecordStore, StorageError};
use cliche::synthesis::merge;

use common::{article_page, FakeFetcher, RUST_TEXT};

fn store(dir: &TempDir) -> RecordStore {
    RecordStore::new(dir.path().join("scrape"), dir.path().join("docs").join("scrape"))
}

#[test]
fn test_record_fields_survive_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut record = ScrapedRecord::new("https://site.test/a", "A")
        .with_description("Desc")
        .with_content("## Heading\n\nBody text.");
    record.set_relevance_score(3.5);
    let mut image = ScrapedImage::new("https://site.test/i.png", "https://site.test/a", 0);
    image.width = Some(200);
    record.images.push(image);

    let path = dir.path().join("records.json");
    save_records(&path, std::slice::from_ref(&record)).unwrap();
    let loaded = load_records(&path).unwrap();

    assert_eq!(loaded, vec![record]);
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with("[\n"), "expected a pretty-printed array");
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "[{\"url\": 1}]").unwrap();
    assert!(matches!(load_records(&path), Err(StorageError::Json { .. })));
}

#[tokio::test]
async fn test_crawl_save_generate() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let seed = "https://site.test/rust";
    let fetcher = Arc::new(FakeFetcher::new().with_html(
        seed,
        &article_page("Rust Guide", &[RUST_TEXT], &[]),
    ));

    let report = Crawler::new(fetcher, CrawlerConfig::default().with_topic("Rust"))
        .crawl(seed, &CancellationToken::new())
        .await;
    assert_eq!(report.records.len(), 1);

    let saved = store.save(&report.records, seed, Some("Rust")).unwrap();
    let name = saved.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("scraped_site_test_Rust_"), "{name}");

    let loaded = store.load_topic("rust").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].url, report.records[0].url);
    assert_eq!(loaded[0].main_content, report.records[0].main_content);
    assert_eq!(loaded[0].timestamp, report.records[0].timestamp);

    let doc = merge(&loaded, "Rust");
    let first = store.write_document("Rust", &doc, None).unwrap();
    let second = store.write_document("Rust", &doc, None).unwrap();
    assert_ne!(first, second);
    assert!(first.ends_with("docs/scrape/rust_markdown.md"));
    assert!(std::fs::read_to_string(second)
        .unwrap()
        .contains("- [Rust Guide](https://site.test/rust)"));
}

#[test]
fn test_topic_lookup_matches_topic_segment_exactly() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let python_docs = ScrapedRecord::new("https://docs.python.org/3/", "untopiced");
    let packaging = ScrapedRecord::new("https://example.com/pkg", "other topic");
    let asyncio = ScrapedRecord::new("https://docs.python.org/3/library/asyncio.html", "python");

    store.save(&[python_docs], "https://docs.python.org/3/", None).unwrap();
    store
        .save(&[packaging], "https://example.com/pkg", Some("python packaging"))
        .unwrap();
    store
        .save(&[asyncio], "https://docs.python.org/3/library/asyncio.html", Some("Python"))
        .unwrap();

    let titles = |topic: &str| -> Vec<String> {
        store
            .load_topic(topic)
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect()
    };
    assert_eq!(titles("python"), vec!["python"]);
    assert_eq!(titles("Python Packaging"), vec!["other topic"]);
    for topic in ["com", "org", "packaging", "docs"] {
        assert!(
            matches!(store.load_topic(topic), Err(StorageError::NotFound(_))),
            "{topic} matched a crawl it was not saved under"
        );
    }
}

#[test]
fn test_unknown_topic_not_found() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        store(&dir).load_topic("haskell"),
        Err(StorageError::NotFound(_))
    ));
}
