//! External news sources.
//!
//! Every source implements [`Fetcher`]: given an interest and its keywords,
//! return candidate articles. Fetchers never touch the database; the
//! collection scheduler hands their output to the ingestion engine.
//!
//! - [`rss`] - any RSS/Atom feed, filtered by keyword
//! - [`naver`] - the Naver news search API
//! - [`http`] - shared GET with retry, backoff and body limits

pub mod http;
pub mod naver;
pub mod rss;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SourceConfig;
pub use http::{build_client, HttpFetch};
pub use naver::NaverFetcher;
pub use rss::RssFetcher;

/// Errors that can occur while fetching from a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as a feed or API response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// A configured endpoint is not a usable URL
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// One fetched article before validation and dedup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCandidate {
    pub source: String,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub publish_date: DateTime<Utc>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Source name stamped on every candidate
    fn source(&self) -> &str;

    /// Candidates matching `keywords` for `interest_id`. An empty result is
    /// not an error.
    async fn fetch(
        &self,
        interest_id: Uuid,
        keywords: &[String],
    ) -> Result<Vec<ArticleCandidate>, FetchError>;
}

/// Instantiate one fetcher per configured source
pub fn build_fetchers(
    sources: &[SourceConfig],
    http: &HttpFetch,
) -> Result<Vec<Arc<dyn Fetcher>>, FetchError> {
    sources
        .iter()
        .map(|source| -> Result<Arc<dyn Fetcher>, FetchError> {
            Ok(match source {
                SourceConfig::Rss { name, url } => {
                    Arc::new(RssFetcher::new(name.clone(), url, http.clone())?)
                }
                SourceConfig::Naver {
                    client_id,
                    client_secret,
                    display,
                    base_url,
                } => Arc::new(NaverFetcher::new(
                    base_url,
                    client_id.clone(),
                    client_secret.clone(),
                    *display,
                    http.clone(),
                )?),
            })
        })
        .collect()
}

/// Lowercased, non-blank keywords for substring matching
pub(crate) fn normalized_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
