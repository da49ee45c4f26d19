use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use std::collections::HashSet;
use uuid::Uuid;

use super::schema::Database;
use super::types::{
    fold_case, parse_id, to_millis, Article, ArticleDbRow, DatabaseError, NewArticle,
    ARTICLE_COLUMNS,
};

// ============================================================================
// Batch Size Constants
// ============================================================================

/// Links per existence query; keeps us under SQLite's 999 bind-parameter limit
const LINK_BATCH_SIZE: usize = 500;

/// Rows per INSERT statement (9 columns * 50 = 450 parameters)
const INSERT_BATCH_SIZE: usize = 50;

impl Database {
    // ========================================================================
    // Link Lookups
    // ========================================================================

    /// Return the subset of `links` already present in the store.
    ///
    /// Soft-deleted rows count as present: their link stays reserved by the
    /// UNIQUE constraint. One query per 500 links.
    pub async fn existing_links(
        &self,
        links: &[String],
    ) -> Result<HashSet<String>, DatabaseError> {
        let mut found = HashSet::new();
        if links.is_empty() {
            return Ok(found);
        }

        for chunk in links.chunks(LINK_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("SELECT original_link FROM articles WHERE original_link IN (");
            let mut separated = builder.separated(", ");
            for link in chunk {
                separated.push_bind(link);
            }
            separated.push_unseparated(")");

            let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&self.pool).await?;
            found.extend(rows.into_iter().map(|(link,)| link));
        }

        tracing::trace!(
            checked = links.len(),
            existing = found.len(),
            "existing_links"
        );
        Ok(found)
    }

    /// Look up an article by its original source link, deleted or not.
    pub async fn find_article_by_link(&self, link: &str) -> Result<Option<Article>, DatabaseError> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE original_link = ?"
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArticleDbRow::into_article).transpose()
    }

    // ========================================================================
    // Batched Insert
    // ========================================================================

    /// Insert a batch of articles in one transaction, returning the ids of
    /// the rows actually created.
    ///
    /// A row whose link already exists (inserted by a racing batch after the
    /// caller's existence check, or repeated inside `articles`) is skipped by
    /// `ON CONFLICT(original_link) DO NOTHING` and is simply absent from the
    /// returned ids. Any other failure rolls back the whole batch.
    pub async fn insert_articles(
        &self,
        articles: &[NewArticle],
    ) -> Result<Vec<Uuid>, DatabaseError> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let now = to_millis(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(articles.len());

        for chunk in articles.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO articles (id, interest_id, source, original_link, title, summary, \
                 title_folded, summary_folded, publish_date, view_count, created_at) ",
            );

            builder.push_values(chunk, |mut b, article| {
                b.push_bind(Uuid::now_v7().to_string())
                    .push_bind(article.interest_id.map(|id| id.to_string()))
                    .push_bind(&article.source)
                    .push_bind(&article.original_link)
                    .push_bind(&article.title)
                    .push_bind(&article.summary)
                    .push_bind(fold_case(&article.title))
                    .push_bind(fold_case(&article.summary))
                    .push_bind(to_millis(article.publish_date))
                    .push_bind(article.view_count)
                    .push_bind(now);
            });
            builder.push(" ON CONFLICT(original_link) DO NOTHING RETURNING id");

            let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&mut *tx).await?;
            for (id,) in rows {
                inserted.push(parse_id("articles", &id)?);
            }
        }

        tx.commit().await?;

        let skipped = articles.len() - inserted.len();
        if skipped > 0 {
            tracing::debug!(
                skipped = skipped,
                inserted = inserted.len(),
                "Link conflicts skipped during batch insert"
            );
        }
        Ok(inserted)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Get a single article by id, including soft-deleted rows.
    pub async fn get_article(&self, id: Uuid) -> Result<Option<Article>, DatabaseError> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArticleDbRow::into_article).transpose()
    }

    /// Live articles published in `[start, end)`, oldest first.
    pub async fn articles_published_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Article>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE deleted = 0 AND publish_date >= ? AND publish_date < ? \
             ORDER BY publish_date ASC, id ASC"
        ))
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ArticleDbRow::into_article).collect()
    }

    /// Distinct source names of live articles, alphabetically.
    pub async fn list_sources(&self) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT source FROM articles WHERE deleted = 0 ORDER BY source")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Soft-delete an article (idempotent), returns whether it was changed.
    ///
    /// The row keeps its link, so the same story is never re-collected.
    pub async fn soft_delete_article(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE articles SET deleted = 1 WHERE id = ? AND deleted = 0")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Administrative purge: remove the row and its view records.
    pub async fn purge_article(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!(article_id = %id, "Article purged");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Adjust the denormalized comment counter, never below zero.
    ///
    /// Called by the comment collaborator when comments are created or removed.
    pub async fn adjust_comment_count(
        &self,
        id: Uuid,
        delta: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE articles SET comment_count = MAX(0, comment_count + ?) WHERE id = ?",
        )
        .bind(delta)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
