//! Network access for crawling: the [`PageFetcher`] capability and its HTTP implementation.

mod fetcher;
mod http_client;

pub use fetcher::{FetchError, PageFetcher};
pub use http_client::{resolve_user_agent, FetchedPage, HttpClient, USER_AGENT};
