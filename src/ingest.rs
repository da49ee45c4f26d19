//! Turns fetched candidates into stored articles without duplicating links.
//!
//! The batched existence check filters links already stored; the
//! `original_link` UNIQUE constraint settles races with a concurrent batch,
//! whose losing rows are skipped and reported as duplicates.

use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::feed::ArticleCandidate;
use crate::storage::{Database, DatabaseError, NewArticle, MAX_SOURCE_LEN};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Interest {0} not found")]
    InterestNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    /// Blank link or title, or an over-long source name
    pub invalid: usize,
    /// In-batch repeats, links already stored, and lost insert races
    pub duplicates: usize,
    pub inserted: Vec<Uuid>,
}

#[derive(Clone)]
pub struct IngestionEngine {
    db: Database,
}

impl IngestionEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store the net-new candidates of one batch for `interest_id`.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::InterestNotFound` for an unknown interest and
    /// `IngestError::Database` for any store failure other than a link
    /// conflict.
    pub async fn ingest(
        &self,
        interest_id: Uuid,
        candidates: Vec<ArticleCandidate>,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport {
            fetched: candidates.len(),
            ..IngestReport::default()
        };

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut unique = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            candidate.link = candidate.link.trim().to_string();
            candidate.title = candidate.title.trim().to_string();

            if let Some(reason) = invalid_reason(&candidate) {
                tracing::debug!(link = %candidate.link, reason, "Discarding candidate");
                report.invalid += 1;
                continue;
            }
            // First occurrence wins
            if !seen.insert(candidate.link.clone()) {
                report.duplicates += 1;
                continue;
            }
            unique.push(candidate);
        }

        if self.db.get_interest(interest_id).await?.is_none() {
            return Err(IngestError::InterestNotFound(interest_id));
        }
        if unique.is_empty() {
            return Ok(report);
        }

        let links: Vec<String> = unique.iter().map(|c| c.link.clone()).collect();
        let existing = self.db.existing_links(&links).await?;

        let fresh: Vec<NewArticle> = unique
            .into_iter()
            .filter(|c| !existing.contains(&c.link))
            .map(|c| NewArticle {
                interest_id: Some(interest_id),
                source: c.source,
                original_link: c.link,
                title: c.title,
                summary: c.summary,
                publish_date: c.publish_date,
                view_count: 0,
            })
            .collect();
        report.duplicates += existing.len();

        let inserted = self.db.insert_articles(&fresh).await?;
        report.duplicates += fresh.len() - inserted.len();
        report.inserted = inserted;

        tracing::info!(
            interest_id = %interest_id,
            fetched = report.fetched,
            invalid = report.invalid,
            duplicates = report.duplicates,
            inserted = report.inserted.len(),
            "Ingestion batch stored"
        );
        Ok(report)
    }
}

fn invalid_reason(candidate: &ArticleCandidate) -> Option<&'static str> {
    if candidate.link.is_empty() {
        Some("blank link")
    } else if candidate.title.is_empty() {
        Some("blank title")
    } else if candidate.source.trim().is_empty()
        || candidate.source.chars().count() > MAX_SOURCE_LEN
    {
        Some("source name length")
    } else {
        None
    }
}
