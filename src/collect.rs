//! Periodic collection: every interest, every fetcher, one ingestion batch
//! per interest.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::feed::Fetcher;
use crate::ingest::IngestionEngine;
use crate::storage::{Database, DatabaseError};

/// Tallies of one collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub interests: usize,
    pub fetch_failures: usize,
    pub ingest_failures: usize,
    pub stored: usize,
}

#[derive(Clone)]
pub struct CollectionScheduler {
    db: Database,
    engine: IngestionEngine,
    fetchers: Vec<Arc<dyn Fetcher>>,
    fetch_timeout: Duration,
}

impl CollectionScheduler {
    pub fn new(db: Database, fetchers: Vec<Arc<dyn Fetcher>>, fetch_timeout: Duration) -> Self {
        Self {
            engine: IngestionEngine::new(db.clone()),
            db,
            fetchers,
            fetch_timeout,
        }
    }

    /// One pass over all interests.
    ///
    /// Fetch and ingestion failures are logged and counted; only failing to
    /// list interests aborts the run.
    pub async fn run_once(&self) -> Result<CollectionSummary, DatabaseError> {
        let interests = self.db.list_interests().await?;
        let mut summary = CollectionSummary {
            interests: interests.len(),
            ..CollectionSummary::default()
        };

        for interest in &interests {
            let mut batch = Vec::new();

            for fetcher in &self.fetchers {
                let fetched = tokio::time::timeout(
                    self.fetch_timeout,
                    fetcher.fetch(interest.id, &interest.keywords),
                )
                .await;

                match fetched {
                    Ok(Ok(candidates)) => {
                        tracing::debug!(
                            source = %fetcher.source(),
                            interest = %interest.name,
                            candidates = candidates.len(),
                            "Fetched candidates"
                        );
                        batch.extend(candidates);
                    }
                    Ok(Err(e)) => {
                        summary.fetch_failures += 1;
                        tracing::warn!(
                            source = %fetcher.source(),
                            interest = %interest.name,
                            error = %e,
                            "Fetch failed, continuing with next source"
                        );
                    }
                    Err(_) => {
                        summary.fetch_failures += 1;
                        tracing::warn!(
                            source = %fetcher.source(),
                            interest = %interest.name,
                            timeout_secs = self.fetch_timeout.as_secs(),
                            "Fetch timed out, continuing with next source"
                        );
                    }
                }
            }

            match self.engine.ingest(interest.id, batch).await {
                Ok(report) => summary.stored += report.inserted.len(),
                Err(e) => {
                    summary.ingest_failures += 1;
                    tracing::error!(
                        interest = %interest.name,
                        error = %e,
                        "Ingestion failed, continuing with next interest"
                    );
                }
            }
        }

        tracing::info!(
            interests = summary.interests,
            fetch_failures = summary.fetch_failures,
            ingest_failures = summary.ingest_failures,
            stored = summary.stored,
            "Collection run finished"
        );
        Ok(summary)
    }

    /// Run every `period`, starting immediately. Ticks missed while a run is
    /// still in progress are skipped, not queued.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::error!(error = %e, "Collection run aborted");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ArticleCandidate, FetchError};
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct StaticFetcher {
        links: Vec<&'static str>,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn source(&self) -> &str {
            "Static"
        }

        async fn fetch(
            &self,
            _interest_id: Uuid,
            keywords: &[String],
        ) -> Result<Vec<ArticleCandidate>, FetchError> {
            Ok(self
                .links
                .iter()
                .map(|link| ArticleCandidate {
                    source: "Static".to_string(),
                    link: link.to_string(),
                    title: format!("{} story", keywords.join(",")),
                    summary: String::new(),
                    publish_date: Utc::now(),
                })
                .collect())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        fn source(&self) -> &str {
            "Failing"
        }

        async fn fetch(&self, _: Uuid, _: &[String]) -> Result<Vec<ArticleCandidate>, FetchError> {
            Err(FetchError::HttpStatus(503))
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl Fetcher for SlowFetcher {
        fn source(&self) -> &str {
            "Slow"
        }

        async fn fetch(&self, _: Uuid, _: &[String]) -> Result<Vec<ArticleCandidate>, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failing_fetchers_do_not_block_siblings() {
        let db = Database::open(":memory:").await.unwrap();
        db.insert_interest("Economy", &["rates".to_string()])
            .await
            .unwrap();

        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(FailingFetcher),
            Arc::new(SlowFetcher),
            Arc::new(StaticFetcher {
                links: vec!["https://news.example.com/1", "https://news.example.com/2"],
            }),
        ];
        let scheduler = CollectionScheduler::new(db.clone(), fetchers, Duration::from_millis(50));

        let summary = scheduler.run_once().await.unwrap();
        assert_eq!(
            summary,
            CollectionSummary {
                interests: 1,
                fetch_failures: 2,
                ingest_failures: 0,
                stored: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_repeated_runs_store_each_link_once() {
        let db = Database::open(":memory:").await.unwrap();
        db.insert_interest("Economy", &["rates".to_string()])
            .await
            .unwrap();
        db.insert_interest("Sports", &["football".to_string()])
            .await
            .unwrap();

        // Both interests see the same links
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(StaticFetcher {
            links: vec!["https://news.example.com/shared"],
        })];
        let scheduler = CollectionScheduler::new(db.clone(), fetchers, Duration::from_secs(5));

        let first = scheduler.run_once().await.unwrap();
        assert_eq!(first.stored, 1);
        let second = scheduler.run_once().await.unwrap();
        assert_eq!(second.stored, 0);
        assert_eq!(db.list_sources().await.unwrap(), vec!["Static"]);
    }

    #[tokio::test]
    async fn test_no_interests_is_empty_run() {
        let db = Database::open(":memory:").await.unwrap();
        let scheduler = CollectionScheduler::new(db, Vec::new(), Duration::from_secs(1));
        assert_eq!(scheduler.run_once().await.unwrap(), CollectionSummary::default());
    }
}
