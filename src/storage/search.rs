use sqlx::{QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::{Article, ArticleDbRow, DatabaseError, ARTICLE_COLUMNS};
use crate::search::predicate::{push_where, Predicate};
use crate::search::{Direction, SortKey};

impl Database {
    // ========================================================================
    // Search Queries
    // ========================================================================

    /// One page of live articles matching every predicate, ordered by
    /// `(key, id)` in `direction`.
    ///
    /// Callers ask for one row more than the page size to learn whether a
    /// next page exists.
    pub(crate) async fn fetch_article_page(
        &self,
        predicates: &[Predicate],
        key: SortKey,
        direction: Direction,
        fetch_limit: i64,
    ) -> Result<Vec<Article>, DatabaseError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_where(&mut builder, predicates);

        let dir = direction.as_sql();
        builder.push(format!(" ORDER BY {} {dir}, id {dir} LIMIT ", key.column()));
        builder.push_bind(fetch_limit);

        tracing::trace!(sql = builder.sql(), "Article page query");
        let rows: Vec<ArticleDbRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ArticleDbRow::into_article).collect()
    }

    /// Number of live articles matching every predicate.
    pub(crate) async fn count_matching(
        &self,
        predicates: &[Predicate],
    ) -> Result<i64, DatabaseError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM articles");
        push_where(&mut builder, predicates);

        let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }
}
