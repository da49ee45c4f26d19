use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use super::{normalized_keywords, ArticleCandidate, FetchError, Fetcher, HttpFetch};
use crate::util::{clean_text, normalize_link};

pub const NAVER_SOURCE: &str = "Naver";
pub const DEFAULT_BASE_URL: &str = "https://openapi.naver.com/";
const SEARCH_PATH: &str = "v1/search/news.json";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    originallink: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pub_date: Option<String>,
}

/// Naver news search, queried once per keyword sorted by date.
pub struct NaverFetcher {
    endpoint: Url,
    client_id: String,
    client_secret: SecretString,
    display: u32,
    http: HttpFetch,
}

impl NaverFetcher {
    pub fn new(
        base_url: &str,
        client_id: String,
        client_secret: SecretString,
        display: u32,
        http: HttpFetch,
    ) -> Result<Self, FetchError> {
        let invalid = |reason: String| FetchError::InvalidEndpoint {
            url: base_url.to_string(),
            reason,
        };

        // Url::join replaces the last segment unless the base ends with '/'
        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(SEARCH_PATH).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            endpoint,
            client_id,
            client_secret,
            display: display.clamp(1, 100),
            http,
        })
    }

    async fn search(&self, keyword: &str) -> Result<Vec<ArticleCandidate>, FetchError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", keyword)
            .append_pair("display", &self.display.to_string())
            .append_pair("sort", "date");

        let bytes = self
            .http
            .get_bytes(self.endpoint.as_str(), |client| {
                client
                    .get(url.clone())
                    .header("X-Naver-Client-Id", &self.client_id)
                    .header("X-Naver-Client-Secret", self.client_secret.expose_secret())
            })
            .await?;

        let response: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        let fetched_at = Utc::now();
        let candidates = response
            .items
            .into_iter()
            .filter_map(|item| {
                let raw_link = if item.originallink.trim().is_empty() {
                    &item.link
                } else {
                    &item.originallink
                };
                let link = normalize_link(raw_link).ok()?;
                let publish_date = item
                    .pub_date
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(fetched_at);

                Some(ArticleCandidate {
                    source: NAVER_SOURCE.to_string(),
                    link,
                    title: clean_text(&item.title),
                    summary: clean_text(&item.description),
                    publish_date,
                })
            })
            .collect();

        Ok(candidates)
    }
}

#[async_trait]
impl Fetcher for NaverFetcher {
    fn source(&self) -> &str {
        NAVER_SOURCE
    }

    async fn fetch(
        &self,
        interest_id: Uuid,
        keywords: &[String],
    ) -> Result<Vec<ArticleCandidate>, FetchError> {
        let mut candidates = Vec::new();
        for keyword in normalized_keywords(keywords) {
            let found = self.search(&keyword).await?;
            tracing::debug!(
                interest_id = %interest_id,
                keyword = %keyword,
                found = found.len(),
                "Naver search"
            );
            candidates.extend(found);
        }
        Ok(candidates)
    }
}
