use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use super::{snapshot_key, ArticleSnapshot, BackupError, BackupStore, StorageFailure};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Snapshots as objects under an HTTP bucket URL (`PUT` to save, `GET` to
/// load). A 404 on load means no snapshot was taken that day.
pub struct ObjectBackupStore {
    base: Url,
    client: reqwest::Client,
}

impl ObjectBackupStore {
    pub fn new(base_url: &str, client: reqwest::Client) -> Result<Self, BackupError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| BackupError::Config(format!("backup.base_url {base_url:?}: {e}")))?;
        // Keys are joined onto the base; without a trailing slash join would
        // replace the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, client })
    }

    fn url_for(&self, date: NaiveDate) -> Result<Url, BackupError> {
        self.base
            .join(&snapshot_key(date))
            .map_err(|e| BackupError::Config(format!("snapshot URL for {date}: {e}")))
    }
}

#[async_trait]
impl BackupStore for ObjectBackupStore {
    async fn save(&self, date: NaiveDate, records: &[ArticleSnapshot]) -> Result<(), BackupError> {
        let url = self.url_for(date)?;
        let body = serde_json::to_vec(records).map_err(|e| BackupError::save(date, e))?;

        let request = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send();
        let response = tokio::time::timeout(REQUEST_TIMEOUT, request)
            .await
            .map_err(|_| BackupError::save(date, StorageFailure::Timeout))?
            .map_err(|e| BackupError::save(date, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::save(date, StorageFailure::Status(status.as_u16())));
        }

        tracing::debug!(url = %url, records = records.len(), "Snapshot uploaded");
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Vec<ArticleSnapshot>, BackupError> {
        let url = self.url_for(date)?;

        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(url.clone()).send())
            .await
            .map_err(|_| BackupError::load(date, StorageFailure::Timeout))?
            .map_err(|e| BackupError::load(date, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(url = %url, "No snapshot for date");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(BackupError::load(date, StorageFailure::Status(status.as_u16())));
        }

        let body = response.bytes().await.map_err(|e| BackupError::load(date, e))?;
        serde_json::from_slice(&body).map_err(|e| BackupError::load(date, e))
    }
}
