//! Image discovery and download.
//!
//! Candidates are read from the unfiltered document so that images in page
//! chrome are still considered; the size filter decides what is kept.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;
use md5::{Digest, Md5};
use scraper::{ElementRef, Html};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::dom::{normalize_whitespace, resolve_href, selector};
use crate::models::ScrapedImage;
use crate::scrapers::{FetchError, PageFetcher};

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Collect image candidates from a page, in document order.
///
/// With `min_size > 0` an image is kept only when both dimensions are
/// declared and at least one of them reaches `min_size`.
pub fn collect_candidates(
    html: &Html,
    base: &Url,
    max_images: usize,
    min_size: u32,
) -> Vec<ScrapedImage> {
    let mut images: Vec<ScrapedImage> = Vec::new();
    let Some(sel) = selector("img") else {
        return images;
    };

    for img in html.select(&sel) {
        if images.len() >= max_images {
            break;
        }
        let el = img.value();
        let Some(src) = el
            .attr("src")
            .filter(|s| !s.trim().is_empty() && !s.trim_start().starts_with("data:"))
            .or_else(|| el.attr("data-src"))
        else {
            continue;
        };
        if src.trim_start().starts_with("data:") {
            continue;
        }
        let Some(url) = resolve_href(base, src) else {
            continue;
        };

        let width = el.attr("width").and_then(parse_dimension);
        let height = el.attr("height").and_then(parse_dimension);
        if !passes_size_filter(width, height, min_size) {
            debug!("Skipping image {} ({:?}x{:?})", url, width, height);
            continue;
        }

        let url = url.to_string();
        if images.iter().any(|i| i.url == url) {
            continue;
        }

        let mut image = ScrapedImage::new(url, base.as_str(), images.len());
        image.alt_text = normalize_whitespace(el.attr("alt").unwrap_or(""));
        image.caption = caption_for(img);
        image.width = width;
        image.height = height;
        images.push(image);
    }

    images
}

/// Parse a declared dimension such as `"150"` or `"150px"`. Zero counts as
/// undeclared.
fn parse_dimension(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

fn passes_size_filter(width: Option<u32>, height: Option<u32>, min_size: u32) -> bool {
    if min_size == 0 {
        return true;
    }
    match (width, height) {
        (Some(w), Some(h)) => !(w < min_size && h < min_size),
        _ => false,
    }
}

fn caption_for(img: ElementRef<'_>) -> Option<String> {
    let figcaption = img
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "figure")
        .and_then(|figure| {
            let sel = selector("figcaption")?;
            figure.select(&sel).next()
        })
        .map(|c| normalize_whitespace(&c.text().collect::<String>()));

    figcaption
        .or_else(|| img.value().attr("aria-label").map(normalize_whitespace))
        .or_else(|| img.value().attr("title").map(normalize_whitespace))
        .filter(|c| !c.is_empty())
}

/// File name for a downloaded image: `image_{md5 prefix}{ext}`.
pub fn image_filename(url: &str, content_type: Option<&str>) -> String {
    let digest = hex::encode(Md5::digest(url.as_bytes()));
    format!("image_{}{}", &digest[..10], image_extension(url, content_type))
}

fn image_extension(url: &str, content_type: Option<&str>) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    if let Some(ext) = path.rsplit_once('.').map(|(_, ext)| ext) {
        if KNOWN_EXTENSIONS.contains(&ext) {
            return format!(".{}", ext);
        }
    }
    match content_type.and_then(content_subtype).as_deref() {
        Some("jpeg") => ".jpg".to_string(),
        Some("svg+xml") => ".svg".to_string(),
        Some(sub) if !sub.is_empty() => format!(".{}", sub),
        _ => ".jpg".to_string(),
    }
}

fn content_subtype(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_lowercase();
    let (kind, sub) = mime.split_once('/')?;
    (kind == "image").then(|| sub.to_string())
}

/// Download images concurrently into `dir`.
///
/// Images that fail to download are dropped from the result.
pub async fn download_images<F>(
    fetcher: &F,
    images: Vec<ScrapedImage>,
    dir: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<ScrapedImage>
where
    F: PageFetcher + ?Sized,
{
    if images.is_empty() {
        return images;
    }
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Failed to create image directory {}: {}", dir.display(), e);
        return Vec::new();
    }

    let downloads = images
        .into_iter()
        .map(|image| download_one(fetcher, image, dir, timeout, cancel));
    join_all(downloads).await.into_iter().flatten().collect()
}

async fn download_one<F>(
    fetcher: &F,
    mut image: ScrapedImage,
    dir: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<ScrapedImage>
where
    F: PageFetcher + ?Sized,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        res = fetcher.fetch(&image.url, timeout) => res,
    };
    let page = match result {
        Ok(page) => page,
        Err(e) => {
            warn!("Failed to download image {}: {}", image.url, e);
            return None;
        }
    };

    let content_type = page.content_type();
    let filename = image_filename(&image.url, content_type);
    let path: PathBuf = dir.join(&filename);
    if let Err(e) = tokio::fs::write(&path, &page.body).await {
        warn!("Failed to save image {}: {}", path.display(), e);
        return None;
    }

    image.file_type = content_type
        .and_then(content_subtype)
        .or_else(|| filename.rsplit_once('.').map(|(_, ext)| ext.to_string()));
    image.local_path = Some(path);
    debug!("Saved image {} ({} bytes)", image.url, page.body.len());
    Some(image)
}
