use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with operator-facing messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file is held by another process
    #[error("Database is locked by another process. Check for a second newsdesk instance.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored value could not be decoded into its domain type
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        DatabaseError::Corrupt {
            table,
            reason: reason.into(),
        }
    }
}

/// Maximum length of an article's source name, enforced by a CHECK constraint
pub const MAX_SOURCE_LEN: usize = 32;

// ============================================================================
// Timestamp helpers
// ============================================================================

// Timestamps are stored as INTEGER milliseconds so range and cursor
// comparisons stay numeric.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(table: &'static str, ms: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DatabaseError::corrupt(table, format!("timestamp out of range: {ms}")))
}

/// Unicode lowercase used for the `*_folded` keyword columns and for
/// search keywords
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

pub(crate) fn parse_id(table: &'static str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::corrupt(table, format!("bad id {raw:?}: {e}")))
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for article queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: String,
    pub interest_id: Option<String>,
    pub source: String,
    pub original_link: String,
    pub title: String,
    pub summary: String,
    pub publish_date: i64,
    pub view_count: i64,
    pub comment_count: i64,
    pub deleted: bool,
    pub created_at: i64,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Result<Article, DatabaseError> {
        Ok(Article {
            id: parse_id("articles", &self.id)?,
            interest_id: self
                .interest_id
                .as_deref()
                .map(|raw| parse_id("articles", raw))
                .transpose()?,
            source: self.source,
            original_link: self.original_link,
            title: self.title,
            summary: self.summary,
            publish_date: from_millis("articles", self.publish_date)?,
            view_count: self.view_count,
            comment_count: self.comment_count,
            deleted: self.deleted,
            created_at: from_millis("articles", self.created_at)?,
        })
    }
}

/// Column list matching [`ArticleDbRow`]
pub(crate) const ARTICLE_COLUMNS: &str = "id, interest_id, source, original_link, title, summary, \
     publish_date, view_count, comment_count, deleted, created_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct InterestDbRow {
    pub id: String,
    pub name: String,
    pub keywords: String,
}

impl InterestDbRow {
    pub(crate) fn into_interest(self) -> Result<Interest, DatabaseError> {
        let keywords: Vec<String> = serde_json::from_str(&self.keywords)
            .map_err(|e| DatabaseError::corrupt("interests", format!("keywords: {e}")))?;
        Ok(Interest {
            id: parse_id("interests", &self.id)?,
            name: self.name,
            keywords,
        })
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Stored article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: Uuid,
    /// `None` for articles restored from a snapshot
    pub interest_id: Option<Uuid>,
    pub source: String,
    /// Unique across every row, deleted or not
    pub original_link: String,
    pub title: String,
    pub summary: String,
    pub publish_date: DateTime<Utc>,
    pub view_count: i64,
    pub comment_count: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Article row about to be inserted
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub interest_id: Option<Uuid>,
    pub source: String,
    pub original_link: String,
    pub title: String,
    pub summary: String,
    pub publish_date: DateTime<Utc>,
    pub view_count: i64,
}

/// Subscription topic whose keywords drive collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub id: Uuid,
    pub name: String,
    pub keywords: Vec<String>,
}
