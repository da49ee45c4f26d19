use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::{snapshot_key, ArticleSnapshot, BackupError, BackupStore};
use crate::storage::Database;

// ============================================================================
// Calendar helpers
// ============================================================================

/// `[date 00:00, date+1 00:00)` in `offset`, as UTC instants
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    let start = date.and_time(NaiveTime::MIN) - shift;
    let start = Utc.from_utc_datetime(&start);
    (start, start + TimeDelta::days(1))
}

/// Fires once a day at a fixed local time
#[derive(Debug, Clone)]
pub struct DailyCadence {
    tz: FixedOffset,
    target: NaiveTime,
}

impl DailyCadence {
    /// `None` if `hour:minute` is not a time of day
    pub fn new(tz: FixedOffset, hour: u32, minute: u32) -> Option<Self> {
        let target = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self { tz, target })
    }

    /// The first trigger strictly after `now`
    pub fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.tz);
        let mut date = local_now.date_naive();
        if local_now.time() >= self.target {
            date = date.succ_opt().unwrap_or(date);
        }

        let shift = TimeDelta::seconds(i64::from(self.tz.local_minus_utc()));
        Utc.from_utc_datetime(&(date.and_time(self.target) - shift))
    }

    pub fn tz(&self) -> FixedOffset {
        self.tz
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Clone)]
pub struct BackupScheduler {
    db: Database,
    store: Arc<dyn BackupStore>,
    cadence: DailyCadence,
}

impl BackupScheduler {
    pub fn new(db: Database, store: Arc<dyn BackupStore>, cadence: DailyCadence) -> Self {
        Self { db, store, cadence }
    }

    /// Snapshot every live article published on `date`; returns the number
    /// of records written.
    pub async fn backup_date(&self, date: NaiveDate) -> Result<usize, BackupError> {
        let (start, end) = day_bounds(date, self.cadence.tz());
        let articles = self.db.articles_published_between(start, end).await?;
        let records: Vec<ArticleSnapshot> = articles.iter().map(ArticleSnapshot::from).collect();

        self.store.save(date, &records).await?;
        tracing::info!(
            key = %snapshot_key(date),
            records = records.len(),
            "Backup snapshot saved"
        );
        Ok(records.len())
    }

    /// The calendar day before `now` in the schedule's offset
    pub fn yesterday(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.with_timezone(&self.cadence.tz()).date_naive();
        today.pred_opt().unwrap_or(today)
    }

    /// Sleep until each trigger and back up the previous day. Failures are
    /// logged; the next day's run is unaffected.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = self.cadence.next_run_from(now);
                let wait = duration_until(next, now);
                tracing::info!(
                    next_run_utc = %next.to_rfc3339(),
                    wait_seconds = wait.as_secs(),
                    "Scheduled daily backup"
                );
                sleep(wait).await;

                let date = self.yesterday(Utc::now());
                if let Err(e) = self.backup_date(date).await {
                    tracing::error!(date = %date, error = %e, "Daily backup failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::LocalBackupStore;
    use crate::storage::NewArticle;
    use pretty_assertions::assert_eq;

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_next_run_same_day_when_before_trigger() {
        let cadence = DailyCadence::new(kst(), 3, 0).unwrap();
        let now = parse_utc("2025-07-01T17:30:00Z"); // 02:30 KST on 07-02
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-07-01T18:00:00Z"));
    }

    #[test]
    fn test_next_run_next_day_when_past_trigger() {
        let cadence = DailyCadence::new(kst(), 3, 0).unwrap();
        let now = parse_utc("2025-07-01T10:00:00Z"); // 19:00 KST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-07-01T18:00:00Z"));
    }

    #[test]
    fn test_next_run_at_trigger_is_tomorrow() {
        let cadence = DailyCadence::new(utc(), 3, 0).unwrap();
        let now = parse_utc("2025-07-01T03:00:00Z");
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-07-02T03:00:00Z"));
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(DailyCadence::new(kst(), 24, 0).is_none());
        assert!(DailyCadence::new(kst(), 3, 60).is_none());
    }

    #[test]
    fn test_day_bounds_with_offset() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(
            day_bounds(date, utc()),
            (parse_utc("2025-07-01T00:00:00Z"), parse_utc("2025-07-02T00:00:00Z"))
        );
        assert_eq!(
            day_bounds(date, kst()),
            (parse_utc("2025-06-30T15:00:00Z"), parse_utc("2025-07-01T15:00:00Z"))
        );
    }

    #[tokio::test]
    async fn test_backup_date_writes_only_that_day() {
        let db = Database::open(":memory:").await.unwrap();
        let article = |link: &str, ts: &str| NewArticle {
            interest_id: None,
            source: "Naver".to_string(),
            original_link: link.to_string(),
            title: link.to_string(),
            summary: String::new(),
            publish_date: parse_utc(ts),
            view_count: 0,
        };
        db.insert_articles(&[
            article("https://news.example.com/before", "2025-06-30T23:59:59Z"),
            article("https://news.example.com/start", "2025-07-01T00:00:00Z"),
            article("https://news.example.com/late", "2025-07-01T23:59:59Z"),
            article("https://news.example.com/after", "2025-07-02T00:00:00Z"),
        ])
        .await
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBackupStore::new(dir.path().to_path_buf()));
        let cadence = DailyCadence::new(utc(), 3, 0).unwrap();
        let scheduler = BackupScheduler::new(db, store.clone(), cadence);

        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(scheduler.backup_date(date).await.unwrap(), 2);

        let links: Vec<String> = store
            .load(date)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_url)
            .collect();
        assert_eq!(
            links,
            vec!["https://news.example.com/start", "https://news.example.com/late"]
        );
    }

    #[tokio::test]
    async fn test_yesterday_uses_schedule_offset() {
        let db = Database::open(":memory:").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBackupStore::new(dir.path().to_path_buf()));
        let scheduler = BackupScheduler::new(db, store, DailyCadence::new(kst(), 3, 0).unwrap());

        // 18:00Z on 07-01 is 03:00 KST on 07-02
        assert_eq!(
            scheduler.yesterday(parse_utc("2025-07-01T18:00:00Z")),
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
        assert_eq!(
            scheduler.yesterday(parse_utc("2025-07-01T14:00:00Z")),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
        );
    }
}
