use chrono::Utc;
use sqlx::QueryBuilder;
use std::collections::HashSet;
use uuid::Uuid;

use super::schema::Database;
use super::types::{parse_id, to_millis, DatabaseError};

impl Database {
    // ========================================================================
    // View Tracking
    // ========================================================================

    /// Record that `user_id` viewed a live article, returns whether this was
    /// the user's first view.
    ///
    /// The view row and the counter increment commit together, so the
    /// counter always equals the number of view rows.
    pub async fn register_view(
        &self,
        article_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO article_views (article_id, user_id, created_at)
            SELECT id, ?, ? FROM articles WHERE id = ? AND deleted = 0
        "#,
        )
        .bind(user_id.to_string())
        .bind(to_millis(Utc::now()))
        .bind(article_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = ?")
                .bind(article_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Remove a view record and decrement the counter, returns whether a
    /// record existed.
    pub async fn remove_view(
        &self,
        article_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM article_views WHERE article_id = ? AND user_id = ?")
            .bind(article_id.to_string())
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if removed {
            sqlx::query(
                "UPDATE articles SET view_count = view_count - 1 WHERE id = ? AND view_count > 0",
            )
            .bind(article_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Which of `article_ids` the user has viewed, in one query.
    pub async fn viewed_article_ids(
        &self,
        user_id: Uuid,
        article_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, DatabaseError> {
        if article_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT article_id FROM article_views WHERE user_id = ");
        builder.push_bind(user_id.to_string());
        builder.push(" AND article_id IN (");
        let mut separated = builder.separated(", ");
        for id in article_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id,)| parse_id("article_views", &id))
            .collect()
    }
}
