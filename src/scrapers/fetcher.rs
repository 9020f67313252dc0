//! Page fetching capability.
//!
//! Everything that touches the network during a crawl goes through
//! [`PageFetcher`], which keeps the crawler and extractors testable with an
//! in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::FetchedPage;

/// Errors that can occur while fetching a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::InvalidUrl(_) | FetchError::Cancelled => false,
        }
    }
}

/// Fetches raw documents over HTTP(S).
///
/// Implementations must honour `timeout` and report non-2xx responses as
/// [`FetchError::Status`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<T> {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url, timeout).await
    }
}
