//! Scrape command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use url::Url;

use cliche::config::Settings;
use cliche::crawl::{Crawler, NOT_RELEVANT};
use cliche::llm::LlmClient;
use cliche::scrapers::HttpClient;
use cliche::storage::{save_records, RecordStore};

use super::icons::{dim_arrow, error, success, warn};

/// Crawl from `url` and store the extracted records.
pub async fn cmd_scrape(
    settings: &Settings,
    url: &str,
    topic: Option<&str>,
    images: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let seed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    if !matches!(seed.scheme(), "http" | "https") {
        bail!("Only http and https URLs can be scraped: {}", url);
    }

    let mut config = settings.to_crawler_config();
    if let Some(topic) = topic {
        config = config.with_topic(topic);
    }
    if images {
        config.extraction.include_images = true;
        config.extraction.image_dir = Some(settings.images_dir());
    }

    let client = HttpClient::with_user_agent(config.request_timeout, settings.user_agent.as_deref())
        .context("Failed to create HTTP client")?;
    let enhance = config.extraction.enhancement_enabled;
    let mut crawler = Crawler::new(client, config);

    if enhance {
        let llm = LlmClient::new(settings.llm.clone())?;
        if llm.is_available().await {
            crawler = crawler.with_enhancer(Arc::new(llm));
        } else {
            eprintln!(
                "{} LLM at {} is not reachable, records will not be enhanced",
                warn(),
                settings.llm.endpoint
            );
        }
    }

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Scraping {}...", url));
    pb.enable_steady_tick(Duration::from_millis(100));

    let report = crawler.crawl(url, &cancel).await;
    watcher.abort();
    pb.finish_and_clear();

    for failure in &report.failures {
        let icon = if failure.reason == NOT_RELEVANT {
            warn()
        } else {
            error()
        };
        eprintln!(
            "  {} {} (depth {}): {}",
            icon,
            failure.url,
            failure.depth,
            failure.reason
        );
    }
    if report.cancelled {
        eprintln!("{} Crawl cancelled", warn());
    }
    if report.is_empty() {
        bail!(
            "No content extracted from {} ({} pages visited)",
            url,
            report.pages_visited
        );
    }

    let path = match output {
        Some(path) => {
            save_records(path, &report.records)?;
            path.to_path_buf()
        }
        None => RecordStore::new(&settings.scrape_dir, &settings.docs_dir).save(
            &report.records,
            url,
            topic,
        )?,
    };

    println!(
        "{} Extracted {} records from {} pages",
        success(),
        report.records.len(),
        report.pages_visited
    );
    println!("  {} Saved to {}", dim_arrow(), path.display());
    if let Some(topic) = topic {
        println!(
            "  {} Run 'cliche generate \"{}\"' to build a document",
            dim_arrow(),
            topic
        );
    }
    Ok(())
}
