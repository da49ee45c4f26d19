//! Filtered, cursor-paginated article search.

pub mod cursor;
pub mod predicate;

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{Article, Database, DatabaseError};
use cursor::CursorPosition;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid search parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    PublishDate,
    CommentCount,
    ViewCount,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::PublishDate => "publishDate",
            SortKey::CommentCount => "commentCount",
            SortKey::ViewCount => "viewCount",
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            SortKey::PublishDate => "publish_date",
            SortKey::CommentCount => "comment_count",
            SortKey::ViewCount => "view_count",
        }
    }

    /// Newest / most discussed / most viewed first
    pub fn default_direction(self) -> Direction {
        Direction::Desc
    }
}

impl FromStr for SortKey {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "publishDate" => Ok(SortKey::PublishDate),
            "commentCount" => Ok(SortKey::CommentCount),
            "viewCount" => Ok(SortKey::ViewCount),
            other => Err(SearchError::InvalidParameter(format!(
                "orderBy must be publishDate, commentCount or viewCount (got {other:?})"
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Comparison selecting rows that come after a position in this direction
    pub(crate) fn comparator(self) -> &'static str {
        match self {
            Direction::Asc => ">",
            Direction::Desc => "<",
        }
    }
}

impl FromStr for Direction {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(SearchError::InvalidParameter(format!(
                "direction must be ASC or DESC (got {s:?})"
            ))),
        }
    }
}

// ============================================================================
// Request / Response
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub keyword: Option<String>,
    pub interest_id: Option<Uuid>,
    pub source_in: Vec<String>,
    pub publish_date_from: Option<DateTime<Utc>>,
    pub publish_date_to: Option<DateTime<Utc>>,
    pub order_by: SortKey,
    /// `None` uses the sort key's default direction
    pub direction: Option<Direction>,
    pub cursor: Option<String>,
    pub after: Option<String>,
    pub limit: Option<u32>,
}

impl SearchRequest {
    pub fn effective_direction(&self) -> Direction {
        self.direction
            .unwrap_or_else(|| self.order_by.default_direction())
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    fn validate(&self) -> Result<(), SearchError> {
        if let (Some(from), Some(to)) = (self.publish_date_from, self.publish_date_to) {
            if from > to {
                return Err(SearchError::InvalidParameter(format!(
                    "publishDateFrom ({from}) is after publishDateTo ({to})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePage {
    pub items: Vec<Article>,
    pub has_next: bool,
    pub next_cursor: Option<String>,
    pub next_after: Option<String>,
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone)]
pub struct SearchEngine {
    db: Database,
}

impl SearchEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// One page of live articles matching `request`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidCursor` for an unparseable `cursor` or
    /// `after`, and `SearchError::InvalidParameter` for an inverted date range.
    pub async fn search(&self, request: &SearchRequest) -> Result<ArticlePage, SearchError> {
        request.validate()?;

        let key = request.order_by;
        let direction = request.effective_direction();
        let limit = request.effective_limit() as usize;
        let position: Option<CursorPosition> =
            cursor::decode(request.cursor.as_deref(), request.after.as_deref(), key)?;

        let predicates = predicate::compose(request, position.as_ref(), direction);
        let mut items = self
            .db
            .fetch_article_page(&predicates, key, direction, limit as i64 + 1)
            .await?;

        let has_next = items.len() > limit;
        items.truncate(limit);

        let (next_cursor, next_after) = match items.last() {
            Some(last) if has_next => (
                Some(last.id.to_string()),
                Some(cursor::encode_after(key, last)),
            ),
            _ => (None, None),
        };

        tracing::debug!(
            order_by = %key,
            direction = direction.as_sql(),
            predicates = predicates.len(),
            returned = items.len(),
            has_next,
            "Article search"
        );

        Ok(ArticlePage {
            items,
            has_next,
            next_cursor,
            next_after,
        })
    }

    /// Total live articles matching `request`'s filters; the cursor is ignored.
    pub async fn count(&self, request: &SearchRequest) -> Result<i64, SearchError> {
        request.validate()?;
        let predicates = predicate::compose(request, None, request.effective_direction());
        Ok(self.db.count_matching(&predicates).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewArticle;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn article(link: &str, title: &str, source: &str, minutes: i64) -> NewArticle {
        NewArticle {
            interest_id: None,
            source: source.to_string(),
            original_link: format!("https://news.example.com/{link}"),
            title: title.to_string(),
            summary: format!("summary of {title}"),
            publish_date: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            view_count: 0,
        }
    }

    async fn engine_with(articles: &[NewArticle]) -> (SearchEngine, Database) {
        let db = Database::open(":memory:").await.unwrap();
        db.insert_articles(articles).await.unwrap();
        (SearchEngine::new(db.clone()), db)
    }

    fn titles(page: &ArticlePage) -> Vec<&str> {
        page.items.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("viewCount".parse::<SortKey>().unwrap(), SortKey::ViewCount);
        assert!("views".parse::<SortKey>().is_err());
        assert_eq!("asc".parse::<Direction>().unwrap(), Direction::Asc);
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        let mut request = SearchRequest::default();
        assert_eq!(request.effective_limit(), 50);
        request.limit = Some(0);
        assert_eq!(request.effective_limit(), 1);
        request.limit = Some(1000);
        assert_eq!(request.effective_limit(), 100);
        assert_eq!(request.effective_direction(), Direction::Desc);
    }

    #[tokio::test]
    async fn test_default_order_is_newest_first() {
        let (engine, _db) = engine_with(&[
            article("a", "Oldest", "Naver", 0),
            article("b", "Newest", "Naver", 20),
            article("c", "Middle", "Naver", 10),
        ])
        .await;

        let page = engine.search(&SearchRequest::default()).await.unwrap();
        assert_eq!(titles(&page), vec!["Newest", "Middle", "Oldest"]);
        assert!(!page.has_next);
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.next_after, None);
    }

    #[tokio::test]
    async fn test_keyword_matches_title_or_summary_case_insensitively() {
        let mut in_summary = article("b", "Markets", "Naver", 1);
        in_summary.summary = "Central bank holds RATES steady".to_string();
        let (engine, _db) = engine_with(&[
            article("a", "Interest rates rise", "Naver", 0),
            in_summary,
            article("c", "Football", "Naver", 2),
        ])
        .await;

        let request = SearchRequest {
            keyword: Some("Rates".to_string()),
            ..SearchRequest::default()
        };
        let page = engine.search(&request).await.unwrap();
        assert_eq!(titles(&page), vec!["Markets", "Interest rates rise"]);
    }

    #[tokio::test]
    async fn test_keyword_folds_non_ascii_case() {
        let mut accented = article("b", "Marchés", "Naver", 1);
        accented.summary = "ÉCONOMIE MONDIALE en berne".to_string();
        let (engine, _db) = engine_with(&[
            article("a", "Économie mondiale", "Naver", 0),
            accented,
            article("c", "Ökonomie", "Naver", 2),
        ])
        .await;

        for keyword in ["économie", "ÉCONOMIE", "Économie Mondiale"] {
            let request = SearchRequest {
                keyword: Some(keyword.to_string()),
                ..SearchRequest::default()
            };
            let page = engine.search(&request).await.unwrap();
            assert_eq!(titles(&page), vec!["Marchés", "Économie mondiale"], "{keyword}");
            assert_eq!(engine.count(&request).await.unwrap(), 2);
        }
    }

    #[tokio::test]
    async fn test_keyword_wildcards_match_literally() {
        let (engine, _db) = engine_with(&[
            article("a", "100% growth", "Naver", 0),
            article("b", "1000 growth", "Naver", 1),
        ])
        .await;

        let request = SearchRequest {
            keyword: Some("100%".to_string()),
            ..SearchRequest::default()
        };
        let page = engine.search(&request).await.unwrap();
        assert_eq!(titles(&page), vec!["100% growth"]);
    }

    #[tokio::test]
    async fn test_filters_combine_and_count_ignores_cursor() {
        let (engine, db) = engine_with(&[
            article("a", "A", "Naver", 0),
            article("b", "B", "Chosun", 10),
            article("c", "C", "Naver", 20),
            article("d", "D", "Naver", 30),
            article("e", "E", "Hankyoreh", 40),
        ])
        .await;
        let interest = db.insert_interest("Economy", &[]).await.unwrap();
        let mut tagged = article("f", "F", "Naver", 25);
        tagged.interest_id = Some(interest.id);
        db.insert_articles(&[tagged]).await.unwrap();

        let base = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let mut request = SearchRequest {
            source_in: vec!["Naver".to_string(), "Chosun".to_string()],
            publish_date_from: Some(base + Duration::minutes(10)),
            publish_date_to: Some(base + Duration::minutes(30)),
            limit: Some(2),
            ..SearchRequest::default()
        };

        let first = engine.search(&request).await.unwrap();
        assert_eq!(titles(&first), vec!["D", "F"]);
        assert!(first.has_next);
        assert_eq!(engine.count(&request).await.unwrap(), 4);

        request.cursor = first.next_cursor.clone();
        request.after = first.next_after.clone();
        let second = engine.search(&request).await.unwrap();
        assert_eq!(titles(&second), vec!["C", "B"]);
        assert!(!second.has_next);
        assert_eq!(engine.count(&request).await.unwrap(), 4);

        let by_interest = SearchRequest {
            interest_id: Some(interest.id),
            ..SearchRequest::default()
        };
        assert_eq!(titles(&engine.search(&by_interest).await.unwrap()), vec!["F"]);
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_excluded() {
        let (engine, db) = engine_with(&[
            article("a", "Kept", "Naver", 0),
            article("b", "Hidden", "Naver", 1),
        ])
        .await;
        let hidden = db
            .find_article_by_link("https://news.example.com/b")
            .await
            .unwrap()
            .unwrap();
        db.soft_delete_article(hidden.id).await.unwrap();

        let page = engine.search(&SearchRequest::default()).await.unwrap();
        assert_eq!(titles(&page), vec!["Kept"]);
        assert_eq!(engine.count(&SearchRequest::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_view_count_paging_with_after_is_exact() {
        let (engine, db) = engine_with(&[
            article("a", "A", "Naver", 0),
            article("b", "B", "Naver", 1),
            article("c", "C", "Naver", 2),
            article("d", "D", "Naver", 3),
        ])
        .await;
        // A and C share a view count
        for (link, views) in [("a", 2), ("b", 5), ("c", 2), ("d", 0)] {
            let article = db
                .find_article_by_link(&format!("https://news.example.com/{link}"))
                .await
                .unwrap()
                .unwrap();
            for _ in 0..views {
                db.register_view(article.id, Uuid::now_v7()).await.unwrap();
            }
        }

        let mut request = SearchRequest {
            order_by: SortKey::ViewCount,
            limit: Some(1),
            ..SearchRequest::default()
        };
        let mut seen = Vec::new();
        loop {
            let page = engine.search(&request).await.unwrap();
            seen.extend(page.items.iter().map(|a| (a.view_count, a.id)));
            if !page.has_next {
                break;
            }
            request.cursor = page.next_cursor;
            request.after = page.next_after;
        }

        let mut expected = seen.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(seen.len(), 4);
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_inverted_date_range_rejected() {
        let (engine, _db) = engine_with(&[]).await;
        let now = Utc::now();
        let request = SearchRequest {
            publish_date_from: Some(now),
            publish_date_to: Some(now - Duration::days(1)),
            ..SearchRequest::default()
        };
        assert!(matches!(
            engine.search(&request).await,
            Err(SearchError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_cursor_rejected() {
        let (engine, _db) = engine_with(&[article("a", "A", "Naver", 0)]).await;
        let request = SearchRequest {
            cursor: Some("garbage".to_string()),
            after: Some("2025-07-01T00:00:00Z".to_string()),
            ..SearchRequest::default()
        };
        assert!(matches!(
            engine.search(&request).await,
            Err(SearchError::InvalidCursor(_))
        ));
    }
}
