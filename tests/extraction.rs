//! Fetch-and-extract pipeline tests for each extractor and for images.

mod common;

use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use cliche::extract::images::image_filename;
use cliche::extract::{ExtractError, Extractor};
use cliche::models::{ExtractionOptions, META_DOMAIN, META_SOURCE};

use common::{FakeFetcher, RUST_TEXT};

const TIMEOUT: Duration = Duration::from_secs(5);

const WIKI_URL: &str = "https://en.wikipedia.org/wiki/Rust_(programming_language)";

const WIKI_PAGE: &str = r#"<html><head><title>Rust (programming language) - Wikipedia</title></head>
<body>
<div id="mw-navigation"><a href="/wiki/Main_Page">Main page</a></div>
<h1 id="firstHeading">Rust (programming language)</h1>
<div id="mw-content-text"><div class="mw-parser-output">
  <table class="infobox"><tr><td>Paradigm</td><td>Multi-paradigm</td></tr></table>
  <p>Rust is a general-purpose programming language emphasizing performance and memory safety.<sup class="reference">[1]</sup></p>
  <h2>History<span class="mw-editsection">[edit]</span></h2>
  <p>Work on <a href="/wiki/Mozilla">Mozilla</a> Research began in 2009.</p>
  <pre>fn main() {
    println!("hello");
}</pre>
  <div class="navbox">Navigation box</div>
</div></div>
</body></html>"#;

async fn extract(
    fetcher: &FakeFetcher,
    url: &str,
    options: &ExtractionOptions,
) -> Result<(cliche::models::ScrapedRecord, Vec<cliche::models::DiscoveredLink>), ExtractError> {
    Extractor::for_url(url)
        .fetch_and_extract(fetcher, url, options, &[], TIMEOUT, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_wikipedia_pipeline() {
    let fetcher = FakeFetcher::new().with_html(WIKI_URL, WIKI_PAGE);
    let (record, links) = extract(&fetcher, WIKI_URL, &ExtractionOptions::default())
        .await
        .unwrap();

    assert_eq!(record.title, "Rust (programming language)");
    assert!(record.description.starts_with("Rust is a general-purpose"));
    assert!(record.main_content.contains("## History"));
    assert!(record.main_content.contains("```"));
    for noise in ["[edit]", "[1]", "Paradigm", "Navigation box", "Main page"] {
        assert!(!record.main_content.contains(noise), "{noise} leaked");
    }
    assert_eq!(record.meta_str(META_SOURCE), Some("wikipedia"));
    assert_eq!(record.meta_str(META_DOMAIN), Some("en.wikipedia.org"));
    assert_eq!(
        links.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(),
        vec!["https://en.wikipedia.org/wiki/Mozilla"]
    );
}

#[tokio::test]
async fn test_python_docs_default_language() {
    let url = "https://docs.python.org/3/library/asyncio.html";
    let page = r##"<html><head><title>asyncio — Python 3.12 documentation</title></head><body>
        <div class="sphinxsidebar">Table of contents</div>
        <div class="body" role="main">
          <h1>asyncio — Asynchronous I/O<a class="headerlink" href="#x">¶</a></h1>
          <p>asyncio is a library to write concurrent code using the async/await syntax.</p>
          <pre>await asyncio.sleep(1)</pre>
        </div></body></html>"##;
    let fetcher = FakeFetcher::new().with_html(url, page);
    let (record, _) = extract(&fetcher, url, &ExtractionOptions::default())
        .await
        .unwrap();

    assert_eq!(record.meta_str(META_SOURCE), Some("python_docs"));
    assert_eq!(record.title, "asyncio — Asynchronous I/O");
    assert!(record.main_content.contains("```python\nawait asyncio.sleep(1)\n```"));
    assert!(!record.main_content.contains("Table of contents"));
}

#[tokio::test]
async fn test_non_html_is_rejected() {
    let url = "https://site.test/report.pdf";
    let fetcher = FakeFetcher::new().with_bytes(url, "application/pdf", b"%PDF-1.4");
    let err = extract(&fetcher, url, &ExtractionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoContent(_)));
}

#[tokio::test]
async fn test_fetch_failure_is_reported_as_value() {
    let fetcher = FakeFetcher::new();
    let result = Extractor::General
        .extract(
            &fetcher,
            "https://site.test/missing",
            &ExtractionOptions::default(),
            &[],
            TIMEOUT,
            &CancellationToken::new(),
        )
        .await;
    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(result.error.is_some_and(|e| e.contains("404")));
}

const IMAGE_PAGE_URL: &str = "https://site.test/gallery";

fn image_page() -> String {
    format!(
        r#"<html><body><article><h1>Gallery</h1><p>{RUST_TEXT}</p>
        <img src="/img/small.png" width="50" height="50" alt="tiny">
        <figure><img src="/img/wide.png" width="150" height="80" alt="wide"><figcaption>A wide image</figcaption></figure>
        </article></body></html>"#
    )
}

fn image_options() -> ExtractionOptions {
    ExtractionOptions {
        include_images: true,
        min_image_size: 100,
        ..ExtractionOptions::default()
    }
}

#[tokio::test]
async fn test_image_size_filter() {
    let fetcher = FakeFetcher::new().with_html(IMAGE_PAGE_URL, &image_page());
    let (record, _) = extract(&fetcher, IMAGE_PAGE_URL, &image_options())
        .await
        .unwrap();

    assert_eq!(record.images.len(), 1);
    let image = &record.images[0];
    assert_eq!(image.url, "https://site.test/img/wide.png");
    assert_eq!(image.alt_text, "wide");
    assert_eq!(image.caption.as_deref(), Some("A wide image"));
    assert_eq!((image.width, image.height), (Some(150), Some(80)));
    assert!(!image.is_downloaded());
}

#[tokio::test]
async fn test_image_download() {
    let dir = TempDir::new().unwrap();
    let wide = "https://site.test/img/wide.png";
    let fetcher = FakeFetcher::new()
        .with_html(IMAGE_PAGE_URL, &image_page())
        .with_bytes(wide, "image/png", b"\x89PNG");
    let options = ExtractionOptions {
        image_dir: Some(dir.path().to_path_buf()),
        ..image_options()
    };

    let (record, _) = extract(&fetcher, IMAGE_PAGE_URL, &options).await.unwrap();

    let image = &record.images[0];
    let expected = dir.path().join(image_filename(wide, Some("image/png")));
    assert_eq!(image.local_path.as_deref(), Some(expected.as_path()));
    assert_eq!(image.file_type.as_deref(), Some("png"));
    assert_eq!(std::fs::read(expected).unwrap(), b"\x89PNG");
    assert_eq!(fetcher.call_count("https://site.test/img/small.png"), 0);
}

#[tokio::test]
async fn test_failed_image_download_is_dropped() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new().with_html(IMAGE_PAGE_URL, &image_page());
    let options = ExtractionOptions {
        image_dir: Some(dir.path().to_path_buf()),
        ..image_options()
    };

    let (record, _) = extract(&fetcher, IMAGE_PAGE_URL, &options).await.unwrap();

    assert!(record.images.is_empty());
    assert!(!record.main_content.is_empty());
}
