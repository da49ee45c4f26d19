//! Rebuilds missing articles from daily snapshots.
//!
//! Each day is diffed against the store by link; only links the store has
//! never seen (or has purged) are re-inserted, so running a restore twice
//! inserts nothing the second time. A day whose snapshot cannot be loaded is
//! logged and reported with its failure; the remaining days still run.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::backup::{ArticleSnapshot, BackupError, BackupStore};
use crate::storage::{Database, DatabaseError, NewArticle, MAX_SOURCE_LEN};

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Invalid restore range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Outcome for one restored day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreResult {
    pub restore_date: NaiveDate,
    pub restored_at: DateTime<Utc>,
    pub restored_article_ids: Vec<Uuid>,
    pub restored_article_count: usize,
    /// Set when the day's snapshot could not be loaded; nothing was restored
    pub failure: Option<String>,
}

impl RestoreResult {
    fn empty(restore_date: NaiveDate, failure: Option<String>) -> Self {
        Self {
            restore_date,
            restored_at: Utc::now(),
            restored_article_ids: Vec::new(),
            restored_article_count: 0,
            failure,
        }
    }
}

#[derive(Clone)]
pub struct RestoreEngine {
    db: Database,
    store: Arc<dyn BackupStore>,
}

impl RestoreEngine {
    pub fn new(db: Database, store: Arc<dyn BackupStore>) -> Self {
        Self { db, store }
    }

    /// Restore every day in `from..=to`, one result per day in order.
    ///
    /// # Errors
    ///
    /// `RestoreError::InvalidRange` when `from > to`, before any I/O. A
    /// database failure stops at that day and propagates; earlier days stay
    /// committed. Snapshot load failures are not errors here: the day's
    /// result carries the failure and the next day is attempted.
    pub async fn restore(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RestoreResult>, RestoreError> {
        if from > to {
            return Err(RestoreError::InvalidRange { from, to });
        }

        let mut results = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            match self.restore_day(date).await {
                Ok(result) => results.push(result),
                Err(RestoreError::Backup(BackupError::Load { key, source })) => {
                    tracing::error!(
                        date = %date,
                        key = %key,
                        error = %source,
                        "Snapshot unavailable, skipping day"
                    );
                    let failure = format!("Failed to load snapshot {key}: {source}");
                    results.push(RestoreResult::empty(date, Some(failure)));
                }
                Err(e) => return Err(e),
            }
        }

        let total: usize = results.iter().map(|r| r.restored_article_count).sum();
        let failed = results.iter().filter(|r| r.failure.is_some()).count();
        tracing::info!(
            from = %from,
            to = %to,
            days = results.len(),
            failed_days = failed,
            restored = total,
            "Restore finished"
        );
        Ok(results)
    }

    async fn restore_day(&self, date: NaiveDate) -> Result<RestoreResult, RestoreError> {
        let snapshot = self.store.load(date).await?;
        let restored_at = Utc::now();

        if snapshot.is_empty() {
            tracing::debug!(date = %date, "Empty snapshot, nothing to restore");
            return Ok(RestoreResult::empty(date, None));
        }

        let mut seen = HashSet::with_capacity(snapshot.len());
        let records: Vec<ArticleSnapshot> = snapshot
            .into_iter()
            .filter(|r| {
                let usable = !r.source_url.trim().is_empty()
                    && !r.title.trim().is_empty()
                    && r.source.chars().count() <= MAX_SOURCE_LEN;
                usable && seen.insert(r.source_url.clone())
            })
            .collect();

        let links: Vec<String> = records.iter().map(|r| r.source_url.clone()).collect();
        let existing = self.db.existing_links(&links).await?;

        let missing: Vec<NewArticle> = records
            .into_iter()
            .filter(|r| !existing.contains(&r.source_url))
            .map(|r| NewArticle {
                // The snapshot carries no interest reference
                interest_id: None,
                source: r.source,
                original_link: r.source_url,
                title: r.title,
                summary: r.summary,
                publish_date: r.publish_date,
                view_count: r.view_count,
            })
            .collect();

        let ids = self.db.insert_articles(&missing).await?;
        tracing::info!(
            date = %date,
            snapshot = links.len(),
            present = existing.len(),
            restored = ids.len(),
            "Snapshot day restored"
        );

        Ok(RestoreResult {
            restore_date: date,
            restored_at,
            restored_article_count: ids.len(),
            restored_article_ids: ids,
            failure: None,
        })
    }
}
