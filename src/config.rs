//! Configuration management for cliche using the prefer crate.
//!
//! Settings are resolved once at startup from four layers, each overriding the
//! one before: built-in defaults, the config file, the environment, and
//! command-line flags. The result is validated before anything touches the
//! network and is not modified afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmConfig;
use crate::models::{CrawlerConfig, ExtractionOptions, RetryPolicy};

/// Upper bound on `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 3;

const SCRAPE_SUBDIR: &str = "scrape";
const DOCS_SUBDIR: &str = "docs";
const IMAGES_SUBDIR: &str = "images";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration file contents. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base data directory. Relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_domain_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_images: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_image_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,

    /// Where this config was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `cliche` config file in the standard locations.
    ///
    /// A missing file is not an error; a file that exists but fails to parse is.
    pub async fn discover() -> Result<Self, ConfigError> {
        match prefer::load("cliche").await {
            Ok(found) => match found.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, or JSON for anything else.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parsed = match ext {
            "toml" => toml::from_str(contents).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            _ => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Directory used to resolve relative paths in this config.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }
}

/// Expand `~` and resolve a relative path against `base_dir`.
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Explicit config file path (skips discovery).
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub max_depth: Option<u32>,
    pub max_pages: Option<usize>,
    pub max_concurrent: Option<usize>,
    pub max_images: Option<usize>,
    pub min_image_size: Option<u32>,
    pub max_retries: Option<u32>,
    /// `--no-llm`.
    pub no_llm: bool,
}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Scraped record files.
    pub scrape_dir: PathBuf,
    /// Generated documents.
    pub docs_dir: PathBuf,
    /// Custom user agent; the client default applies when unset.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    pub max_depth: u32,
    pub max_pages: usize,
    pub max_concurrent: usize,
    pub same_domain_only: bool,
    pub max_images: usize,
    pub min_image_size: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub enhancement_enabled: bool,
    pub llm: LlmConfig,
    /// Config file the settings were read from, if any.
    pub config_path: Option<PathBuf>,
}

/// Default base directory: `~/cliche/files`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cliche")
        .join("files")
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl Settings {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let crawl = CrawlerConfig::default();
        let retry = RetryPolicy::default();
        let extraction = ExtractionOptions::default();
        Self {
            scrape_dir: data_dir.join(SCRAPE_SUBDIR),
            docs_dir: data_dir.join(DOCS_SUBDIR).join(SCRAPE_SUBDIR),
            data_dir,
            user_agent: None,
            request_timeout: crawl.request_timeout.as_secs(),
            max_depth: crawl.max_depth,
            max_pages: crawl.max_pages,
            max_concurrent: crawl.max_concurrent,
            same_domain_only: crawl.same_domain_only,
            max_images: extraction.max_images,
            min_image_size: extraction.min_image_size,
            max_retries: retry.max_retries,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
            enhancement_enabled: false,
            llm: LlmConfig::base_default(),
            config_path: None,
        }
    }

    /// Load settings from the config file, the process environment and `overrides`.
    pub async fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let config = match overrides.config_path {
            Some(ref path) => Config::load_from_path(path).await?,
            None => Config::discover().await?,
        };
        Self::resolve(config, |key| std::env::var(key).ok(), &overrides)
    }

    /// Layer `config`, the variables from `env`, and `overrides` over the defaults.
    pub fn resolve<F>(config: Config, env: F, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        settings.apply_config(config);
        settings.apply_env(&env)?;
        settings.apply_overrides(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.scrape_dir = data_dir.join(SCRAPE_SUBDIR);
        self.docs_dir = data_dir.join(DOCS_SUBDIR).join(SCRAPE_SUBDIR);
        self.data_dir = data_dir;
    }

    fn apply_config(&mut self, config: Config) {
        let base_dir = config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        if let Some(ref data_dir) = config.data_dir {
            self.set_data_dir(resolve_path(data_dir, &base_dir));
        }
        if config.user_agent.is_some() {
            self.user_agent = config.user_agent;
        }
        if let Some(v) = config.request_timeout {
            self.request_timeout = v;
        }
        if let Some(v) = config.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = config.max_pages {
            self.max_pages = v;
        }
        if let Some(v) = config.max_concurrent {
            self.max_concurrent = v;
        }
        if let Some(v) = config.same_domain_only {
            self.same_domain_only = v;
        }
        if let Some(v) = config.max_images {
            self.max_images = v;
        }
        if let Some(v) = config.min_image_size {
            self.min_image_size = v;
        }
        if let Some(v) = config.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = config.retry_backoff_ms {
            self.retry_backoff_ms = v;
        }
        self.llm = config.llm;
        self.enhancement_enabled = config.enhancement_enabled.unwrap_or(self.llm.enabled);
        self.config_path = config.source_path;
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("CLICHE_DATA_DIR") {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            self.set_data_dir(resolve_path(&dir, &cwd));
        }
        if let Some(agent) = var("CLICHE_USER_AGENT") {
            self.user_agent = Some(agent);
        }
        if let Some(v) = var("CLICHE_REQUEST_TIMEOUT") {
            self.request_timeout = parse_env("CLICHE_REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = var("CLICHE_MAX_PAGES") {
            self.max_pages = parse_env("CLICHE_MAX_PAGES", &v)?;
        }
        if let Some(v) = var("CLICHE_MAX_DEPTH") {
            self.max_depth = parse_env("CLICHE_MAX_DEPTH", &v)?;
        }

        let was_enabled = self.llm.enabled;
        self.llm = self.llm.clone().with_env_from(|key| var(key));
        if self.llm.enabled && !was_enabled {
            self.enhancement_enabled = true;
        } else if !self.llm.enabled {
            self.enhancement_enabled = false;
        }

        if var("CLICHE_NO_LLM").is_some_and(|v| is_truthy(&v)) {
            self.enhancement_enabled = false;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref dir) = overrides.data_dir {
            self.set_data_dir(dir.clone());
        }
        if let Some(v) = overrides.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = overrides.max_pages {
            self.max_pages = v;
        }
        if let Some(v) = overrides.max_concurrent {
            self.max_concurrent = v;
        }
        if let Some(v) = overrides.max_images {
            self.max_images = v;
        }
        if let Some(v) = overrides.min_image_size {
            self.min_image_size = v;
        }
        if let Some(v) = overrides.max_retries {
            self.max_retries = v;
        }
        if overrides.no_llm {
            self.enhancement_enabled = false;
        }
    }

    /// Check the resolved values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages < 1 {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }
        if self.max_concurrent < 1 {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.request_timeout < 1 {
            return Err(ConfigError::Invalid(
                "request_timeout must be at least 1 second".into(),
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be at most {}",
                MAX_RETRIES_LIMIT
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be between 0 and 2".into(),
            ));
        }
        Ok(())
    }

    /// Directory for downloaded images.
    pub fn images_dir(&self) -> PathBuf {
        self.scrape_dir.join(IMAGES_SUBDIR)
    }

    /// Crawl configuration carrying these settings. Topic and image
    /// collection are per-command and set by the caller.
    pub fn to_crawler_config(&self) -> CrawlerConfig {
        let extraction = ExtractionOptions {
            max_images: self.max_images,
            min_image_size: self.min_image_size,
            enhancement_enabled: self.enhancement_enabled && self.llm.enabled,
            max_content_chars: self.llm.max_content_chars,
            ..ExtractionOptions::default()
        };
        CrawlerConfig {
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            max_concurrent: self.max_concurrent,
            same_domain_only: self.same_domain_only,
            topic: None,
            request_timeout: Duration::from_secs(self.request_timeout),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            extraction,
        }
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("********".to_string());
        }
        copy
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: {}", key, value)))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn resolve(config: Config, vars: &[(&str, &str)], overrides: Overrides) -> Settings {
        Settings::resolve(config, env(vars), &overrides).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(Config::default(), &[], Overrides::default());
        assert!(settings.data_dir.ends_with("cliche/files"));
        assert_eq!(settings.scrape_dir, settings.data_dir.join("scrape"));
        assert_eq!(settings.docs_dir, settings.data_dir.join("docs").join("scrape"));
        assert_eq!(settings.request_timeout, 30);
        assert_eq!(settings.max_depth, 0);
        assert_eq!(settings.max_pages, 3);
        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(settings.max_images, 20);
        assert_eq!(settings.min_image_size, 100);
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.retry_backoff_ms, 500);
        assert!(!settings.enhancement_enabled);
    }

    #[test]
    fn test_parse_formats() {
        let toml = Config::parse(
            Path::new("c.toml"),
            "max_pages = 7\n[llm]\nmodel = \"m\"\n",
        )
        .unwrap();
        assert_eq!(toml.max_pages, Some(7));
        assert_eq!(toml.llm.model, "m");

        let yaml = Config::parse(Path::new("c.yml"), "max_depth: 2\n").unwrap();
        assert_eq!(yaml.max_depth, Some(2));

        let json = Config::parse(Path::new("c"), r#"{"same_domain_only": false}"#).unwrap();
        assert_eq!(json.same_domain_only, Some(false));

        let err = Config::parse(Path::new("c.toml"), "max_pages = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_layer_precedence() {
        let config = Config {
            max_pages: Some(5),
            max_depth: Some(1),
            request_timeout: Some(10),
            ..Config::default()
        };
        let settings = resolve(
            config,
            &[("CLICHE_MAX_PAGES", "8"), ("CLICHE_REQUEST_TIMEOUT", "12")],
            Overrides {
                max_pages: Some(9),
                ..Overrides::default()
            },
        );
        assert_eq!(settings.max_pages, 9);
        assert_eq!(settings.request_timeout, 12);
        assert_eq!(settings.max_depth, 1);
    }

    #[test]
    fn test_data_dir_layers() {
        let settings = resolve(
            Config::default(),
            &[("CLICHE_DATA_DIR", "/srv/cliche")],
            Overrides::default(),
        );
        assert_eq!(settings.scrape_dir, PathBuf::from("/srv/cliche/scrape"));

        let settings = resolve(
            Config::default(),
            &[("CLICHE_DATA_DIR", "/srv/cliche")],
            Overrides {
                data_dir: Some(PathBuf::from("/tmp/other")),
                ..Overrides::default()
            },
        );
        assert_eq!(settings.docs_dir, PathBuf::from("/tmp/other/docs/scrape"));
    }

    #[test]
    fn test_config_relative_data_dir() {
        let config = Config {
            data_dir: Some("data".into()),
            source_path: Some(PathBuf::from("/etc/cliche/config.toml")),
            ..Config::default()
        };
        let settings = resolve(config, &[], Overrides::default());
        assert_eq!(settings.data_dir, PathBuf::from("/etc/cliche/data"));
    }

    #[test]
    fn test_enhancement_follows_llm() {
        let settings = resolve(
            Config::default(),
            &[("GROQ_API_KEY", "k")],
            Overrides::default(),
        );
        assert!(settings.llm.enabled);
        assert!(settings.enhancement_enabled);
        assert!(settings.to_crawler_config().extraction.enhancement_enabled);

        let settings = resolve(
            Config::default(),
            &[("GROQ_API_KEY", "k"), ("CLICHE_NO_LLM", "1")],
            Overrides::default(),
        );
        assert!(!settings.enhancement_enabled);

        let settings = resolve(
            Config::default(),
            &[("GROQ_API_KEY", "k")],
            Overrides {
                no_llm: true,
                ..Overrides::default()
            },
        );
        assert!(!settings.enhancement_enabled);
    }

    #[test]
    fn test_validation() {
        let cases = [
            Overrides {
                max_pages: Some(0),
                ..Overrides::default()
            },
            Overrides {
                max_concurrent: Some(0),
                ..Overrides::default()
            },
            Overrides {
                max_retries: Some(4),
                ..Overrides::default()
            },
        ];
        for overrides in cases {
            let err = Settings::resolve(Config::default(), env(&[]), &overrides).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
        }

        let err = Settings::resolve(
            Config::default(),
            env(&[("LLM_TEMPERATURE", "3.5")]),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Settings::resolve(
            Config::default(),
            env(&[("CLICHE_MAX_DEPTH", "deep")]),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_to_crawler_config() {
        let settings = resolve(
            Config::default(),
            &[],
            Overrides {
                max_depth: Some(2),
                max_retries: Some(2),
                min_image_size: Some(0),
                ..Overrides::default()
            },
        );
        let crawl = settings.to_crawler_config();
        assert_eq!(crawl.max_depth, 2);
        assert_eq!(crawl.retry.max_retries, 2);
        assert_eq!(crawl.retry.backoff, Duration::from_millis(500));
        assert_eq!(crawl.request_timeout, Duration::from_secs(30));
        assert_eq!(crawl.extraction.min_image_size, 0);
        assert!(crawl.topic.is_none());
    }

    #[test]
    fn test_redacted_masks_key() {
        let settings = resolve(
            Config::default(),
            &[("OPENAI_API_KEY", "sk-secret")],
            Overrides::default(),
        );
        let shown = serde_json::to_string(&settings.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
    }
}
