use async_trait::async_trait;
use chrono::Utc;
use feed_rs::parser;
use url::Url;
use uuid::Uuid;

use super::{normalized_keywords, ArticleCandidate, FetchError, Fetcher, HttpFetch};
use crate::util::{clean_text, normalize_link};

/// Any RSS/Atom feed. Entries whose title or summary mention one of the
/// interest's keywords become candidates.
pub struct RssFetcher {
    name: String,
    url: Url,
    http: HttpFetch,
}

impl RssFetcher {
    pub fn new(name: String, url: &str, http: HttpFetch) -> Result<Self, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidEndpoint {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { name, url, http })
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    fn source(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        interest_id: Uuid,
        keywords: &[String],
    ) -> Result<Vec<ArticleCandidate>, FetchError> {
        let needles = normalized_keywords(keywords);
        if needles.is_empty() {
            return Ok(Vec::new());
        }

        let bytes = self
            .http
            .get_bytes(self.url.as_str(), |client| client.get(self.url.clone()))
            .await?;
        let feed = parser::parse(bytes.as_slice()).map_err(|e| FetchError::Parse(e.to_string()))?;

        let fetched_at = Utc::now();
        let mut candidates = Vec::new();
        let mut bad_links = 0usize;

        for entry in feed.entries {
            let title = entry
                .title
                .map(|t| clean_text(&t.content))
                .unwrap_or_default();
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|s| clean_text(&s))
                .unwrap_or_default();

            let haystack = format!("{}\n{}", title.to_lowercase(), summary.to_lowercase());
            if !needles.iter().any(|n| haystack.contains(n.as_str())) {
                continue;
            }

            let Some(link) = entry.links.first().and_then(|l| normalize_link(&l.href).ok()) else {
                bad_links += 1;
                continue;
            };

            candidates.push(ArticleCandidate {
                source: self.name.clone(),
                link,
                title,
                summary,
                // Entries without a date are treated as just published
                publish_date: entry.published.or(entry.updated).unwrap_or(fetched_at),
            });
        }

        if bad_links > 0 {
            tracing::warn!(
                source = %self.name,
                filtered = bad_links,
                "Entries with invalid links skipped"
            );
        }
        tracing::debug!(
            source = %self.name,
            interest_id = %interest_id,
            matched = candidates.len(),
            "RSS feed fetched"
        );

        Ok(candidates)
    }
}
