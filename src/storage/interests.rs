use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, Interest, InterestDbRow};

impl Database {
    // ========================================================================
    // Interest Operations
    // ========================================================================

    /// Register an interest with its collection keywords.
    ///
    /// Interest management belongs to the subscription service; this insert
    /// exists for seeding and tests.
    pub async fn insert_interest(
        &self,
        name: &str,
        keywords: &[String],
    ) -> Result<Interest, DatabaseError> {
        let id = Uuid::now_v7();
        let encoded = serde_json::to_string(keywords)
            .map_err(|e| DatabaseError::corrupt("interests", format!("keywords: {e}")))?;

        sqlx::query("INSERT INTO interests (id, name, keywords, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(name)
            .bind(&encoded)
            .bind(to_millis(Utc::now()))
            .execute(&self.pool)
            .await?;

        tracing::info!(
            interest_id = %id,
            name = %name,
            keywords = keywords.len(),
            "Interest registered"
        );
        Ok(Interest {
            id,
            name: name.to_string(),
            keywords: keywords.to_vec(),
        })
    }

    pub async fn get_interest(&self, id: Uuid) -> Result<Option<Interest>, DatabaseError> {
        let row = sqlx::query_as::<_, InterestDbRow>(
            "SELECT id, name, keywords FROM interests WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InterestDbRow::into_interest).transpose()
    }

    /// All interests, by name.
    pub async fn list_interests(&self) -> Result<Vec<Interest>, DatabaseError> {
        let rows = sqlx::query_as::<_, InterestDbRow>(
            "SELECT id, name, keywords FROM interests ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InterestDbRow::into_interest).collect()
    }
}
