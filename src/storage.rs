//! Storage of scraped records and generated documents on disk.
//!
//! Records from one crawl go into a single pretty-printed JSON array named
//! after the domain, the topic and the time of the crawl. Documents are
//! markdown files that never overwrite an earlier one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::ScrapedRecord;

/// Errors from reading or writing stored data.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid record file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No scraped data found for topic '{0}'")]
    NotFound(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A record file holds either a list of records or a single one.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<ScrapedRecord>),
    One(Box<ScrapedRecord>),
}

/// Topic as used in directory and document names: lowercase, spaces to `_`.
pub fn topic_slug(topic: &str) -> String {
    topic.trim().to_lowercase().replace(' ', "_")
}

/// Topic as embedded in record file names: anything but `[A-Za-z0-9_]` becomes `_`.
pub fn sanitize_topic(topic: &str) -> String {
    topic
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn domain_slug(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase().replace('.', "_")))
}

/// File name for the records of one crawl.
pub fn records_filename(url: &str, topic: Option<&str>, at: DateTime<Local>) -> String {
    let domain = domain_slug(url).unwrap_or_else(|| "unknown".to_string());
    let stamp = at.format("%Y%m%d_%H%M%S");
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!("scraped_{}_{}_{}.json", domain, sanitize_topic(topic), stamp),
        None => format!("scraped_{}_{}.json", domain, stamp),
    }
}

/// Record and document storage rooted at two directories.
#[derive(Debug, Clone)]
pub struct RecordStore {
    scrape_dir: PathBuf,
    docs_dir: PathBuf,
}

impl RecordStore {
    pub fn new(scrape_dir: impl Into<PathBuf>, docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            scrape_dir: scrape_dir.into(),
            docs_dir: docs_dir.into(),
        }
    }

    pub fn scrape_dir(&self) -> &Path {
        &self.scrape_dir
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Save the records of a crawl of `url` under the scrape directory.
    pub fn save(
        &self,
        records: &[ScrapedRecord],
        url: &str,
        topic: Option<&str>,
    ) -> Result<PathBuf, StorageError> {
        let path = self
            .scrape_dir
            .join(records_filename(url, topic, Local::now()));
        save_records(&path, records)?;
        Ok(path)
    }

    /// Load every stored record for `topic`.
    ///
    /// Looks at `<slug>.json`, every JSON file in `<slug>/`, and the crawl
    /// files saved under exactly that topic (case-insensitive). Crawl files
    /// saved without a topic never match.
    pub fn load_topic(&self, topic: &str) -> Result<Vec<ScrapedRecord>, StorageError> {
        let mut files = self.topic_files(topic)?;
        let mut seen = HashSet::new();
        files.retain(|(path, _)| seen.insert(path.clone()));
        if files.is_empty() {
            return Err(StorageError::NotFound(topic.to_string()));
        }

        let mut records = Vec::new();
        for (file, domain) in &files {
            match load_records(file) {
                Ok(mut loaded) => {
                    if let Some(domain) = domain {
                        // The name only splits into domain and topic at a
                        // point where the domain agrees with the records.
                        if !loaded
                            .iter()
                            .any(|r| domain_slug(&r.url).as_deref() == Some(domain.as_str()))
                        {
                            debug!("{} is not a crawl for '{}'", file.display(), topic);
                            continue;
                        }
                    }
                    debug!("Loaded {} records from {}", loaded.len(), file.display());
                    records.append(&mut loaded);
                }
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }
        if records.is_empty() {
            return Err(StorageError::NotFound(topic.to_string()));
        }
        Ok(records)
    }

    /// Candidate files for `topic`, paired with the domain their name
    /// claims when they are crawl files.
    fn topic_files(&self, topic: &str) -> Result<Vec<(PathBuf, Option<String>)>, StorageError> {
        let slug = topic_slug(topic);
        let mut files = Vec::new();

        let direct = self.scrape_dir.join(format!("{}.json", slug));
        if direct.is_file() {
            files.push((direct, None));
        }

        let topic_dir = self.scrape_dir.join(&slug);
        if topic_dir.is_dir() {
            files.extend(json_files(&topic_dir, |_| true)?.into_iter().map(|p| (p, None)));
        }

        let suffix = format!("_{}", sanitize_topic(topic).to_lowercase());
        if self.scrape_dir.is_dir() && suffix.len() > 1 {
            for path in json_files(&self.scrape_dir, |name| {
                crawl_file_domain(name, &suffix).is_some()
            })? {
                let domain = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_lowercase)
                    .and_then(|name| crawl_file_domain(&name, &suffix));
                files.push((path, domain));
            }
        }
        Ok(files)
    }

    /// Write a generated document and return where it went.
    ///
    /// Without `output` the document goes to `<docs_dir>/<slug>_markdown.md`,
    /// suffixed `_1`, `_2` and so on when that name is taken.
    pub fn write_document(
        &self,
        topic: &str,
        content: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => unique_path(&self.docs_dir, &format!("{}_markdown", topic_slug(topic)), "md"),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        std::fs::write(&path, content).map_err(io_error(&path))?;
        Ok(path)
    }
}

/// Write records as a pretty-printed JSON array.
pub fn save_records(path: &Path, records: &[ScrapedRecord]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let json = serde_json::to_string_pretty(records).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_error(path))
}

static CRAWL_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^scraped_(.+)_\d{8}_\d{6}\.json$").unwrap());

/// Domain part of a lowercased crawl file name whose topic segment is
/// exactly `topic_suffix` (`_<topic>`).
fn crawl_file_domain(name: &str, topic_suffix: &str) -> Option<String> {
    let caps = CRAWL_FILE.captures(name)?;
    caps[1]
        .strip_suffix(topic_suffix)
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
}

/// Read a record file holding a list of records or a single record.
pub fn load_records(path: &Path) -> Result<Vec<ScrapedRecord>, StorageError> {
    let text = std::fs::read_to_string(path).map_err(io_error(path))?;
    let file: RecordFile = serde_json::from_str(&text).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match file {
        RecordFile::Many(records) => records,
        RecordFile::One(record) => vec![*record],
    })
}

/// JSON files in `dir` whose lowercased name passes `keep`, sorted by name.
fn json_files<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>, StorageError>
where
    F: Fn(&str) -> bool,
{
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_lowercase)
                .is_some_and(|name| name.ends_with(".json") && keep(&name))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, ext));
    if !first.exists() {
        return first;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
