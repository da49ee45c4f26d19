use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

use super::{snapshot_key, ArticleSnapshot, BackupError, BackupStore};

/// Snapshots as files in one directory
pub struct LocalBackupStore {
    base_path: PathBuf,
}

impl LocalBackupStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_path.join(snapshot_key(date))
    }
}

#[async_trait]
impl BackupStore for LocalBackupStore {
    async fn save(&self, date: NaiveDate, records: &[ArticleSnapshot]) -> Result<(), BackupError> {
        let body = serde_json::to_vec(records).map_err(|e| BackupError::save(date, e))?;

        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| BackupError::save(date, e))?;

        let path = self.path_for(date);
        write_atomic(&path, &body)
            .await
            .map_err(|e| BackupError::save(date, e))?;

        tracing::debug!(path = %path.display(), records = records.len(), "Snapshot written");
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Vec<ArticleSnapshot>, BackupError> {
        let path = self.path_for(date);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No snapshot for date");
                return Ok(Vec::new());
            }
            Err(e) => return Err(BackupError::load(date, e)),
        };

        serde_json::from_slice(&body).map_err(|e| BackupError::load(date, e))
    }
}

/// Write to a uniquely named sibling temp file, sync, then rename over
/// `dst`, so readers never observe a partial snapshot.
async fn write_atomic(dst: &Path, body: &[u8]) -> std::io::Result<()> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", suffix));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(body).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, dst).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}
