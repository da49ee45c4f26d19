//! Daily article snapshots.
//!
//! A snapshot is the JSON array of every live article published on one
//! calendar day, stored under `articles-YYYY-MM-DD.json`. [`BackupStore`]
//! hides where snapshots live; [`local`] writes files, [`object`] talks to
//! an HTTP bucket.

pub mod local;
pub mod object;
pub mod scheduler;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{BackupConfig, BackupKind};
use crate::storage::{Article, DatabaseError};
pub use local::LocalBackupStore;
pub use object::ObjectBackupStore;
pub use scheduler::{day_bounds, BackupScheduler, DailyCadence};

// ============================================================================
// Error Types
// ============================================================================

/// What went wrong underneath a snapshot load or save
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: status {0}")]
    Status(u16),

    #[error("Invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to load snapshot {key}: {source}")]
    Load {
        key: String,
        #[source]
        source: StorageFailure,
    },

    #[error("Failed to save snapshot {key}: {source}")]
    Save {
        key: String,
        #[source]
        source: StorageFailure,
    },

    #[error("Invalid backup configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl BackupError {
    pub(crate) fn load(date: NaiveDate, source: impl Into<StorageFailure>) -> Self {
        BackupError::Load {
            key: snapshot_key(date),
            source: source.into(),
        }
    }

    pub(crate) fn save(date: NaiveDate, source: impl Into<StorageFailure>) -> Self {
        BackupError::Save {
            key: snapshot_key(date),
            source: source.into(),
        }
    }
}

// ============================================================================
// Snapshot Record
// ============================================================================

/// Self-contained projection of an article, as written to a snapshot.
///
/// Carries no interest reference; restore recreates rows from these fields
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSnapshot {
    pub id: Uuid,
    pub source: String,
    pub source_url: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub view_count: i64,
}

impl From<&Article> for ArticleSnapshot {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            source: article.source.clone(),
            source_url: article.original_link.clone(),
            title: article.title.clone(),
            publish_date: article.publish_date,
            summary: article.summary.clone(),
            comment_count: article.comment_count,
            view_count: article.view_count,
        }
    }
}

/// Object key of the snapshot for `date`
pub fn snapshot_key(date: NaiveDate) -> String {
    format!("articles-{}.json", date.format("%Y-%m-%d"))
}

// ============================================================================
// Store Trait
// ============================================================================

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Write the whole snapshot for `date`, replacing any previous one.
    async fn save(&self, date: NaiveDate, records: &[ArticleSnapshot]) -> Result<(), BackupError>;

    /// Read the snapshot for `date`; a missing snapshot is an empty list.
    async fn load(&self, date: NaiveDate) -> Result<Vec<ArticleSnapshot>, BackupError>;
}

/// Build the store selected by `backup.kind`
pub fn store_from_config(
    config: &BackupConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn BackupStore>, BackupError> {
    match config.kind {
        BackupKind::Local => Ok(Arc::new(LocalBackupStore::new(config.base_path.clone()))),
        BackupKind::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                BackupError::Config("backup.kind = \"http\" requires backup.base_url".to_string())
            })?;
            Ok(Arc::new(ObjectBackupStore::new(base_url, client)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_key_format() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(snapshot_key(date), "articles-2025-07-01.json");
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let snapshot = ArticleSnapshot {
            id: Uuid::nil(),
            source: "Naver".to_string(),
            source_url: "https://news.example.com/a".to_string(),
            title: "Title".to_string(),
            publish_date: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
            summary: "Summary".to_string(),
            comment_count: 2,
            view_count: 5,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "source": "Naver",
                "sourceUrl": "https://news.example.com/a",
                "title": "Title",
                "publishDate": "2025-07-01T09:00:00Z",
                "summary": "Summary",
                "commentCount": 2,
                "viewCount": 5
            })
        );
    }

    #[test]
    fn test_snapshot_tolerates_missing_counters() {
        let snapshot: ArticleSnapshot = serde_json::from_str(
            r#"{"id":"00000000-0000-0000-0000-000000000000","source":"Naver",
                "sourceUrl":"https://news.example.com/a","title":"T",
                "publishDate":"2025-07-01T09:00:00+09:00"}"#,
        )
        .unwrap();
        assert_eq!(snapshot.view_count, 0);
        assert_eq!(snapshot.summary, "");
        assert_eq!(
            snapshot.publish_date,
            Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
        );
    }
}
