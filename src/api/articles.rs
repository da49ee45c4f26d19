use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::restore::RestoreResult;
use crate::search::SearchRequest;
use crate::storage::Article;

/// Identifies the viewer for `viewedByMe` and view registration
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: Uuid,
    pub source: String,
    pub source_url: String,
    pub title: String,
    pub publish_date: DateTime<Utc>,
    pub summary: String,
    pub comment_count: i64,
    pub view_count: i64,
    pub viewed_by_me: bool,
}

impl ArticleResponse {
    fn new(article: Article, viewed_by_me: bool) -> Self {
        Self {
            id: article.id,
            source: article.source,
            source_url: article.original_link,
            title: article.title,
            publish_date: article.publish_date,
            summary: article.summary,
            comment_count: article.comment_count,
            view_count: article.view_count,
            viewed_by_me,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePageResponse {
    pub content: Vec<ArticleResponse>,
    pub next_cursor: Option<String>,
    pub next_after: Option<String>,
    pub size: usize,
    pub total_elements: i64,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResultResponse {
    pub restore_date: NaiveDate,
    pub restored_at: DateTime<Utc>,
    pub restored_article_ids: Vec<Uuid>,
    pub restored_article_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<RestoreResult> for RestoreResultResponse {
    fn from(r: RestoreResult) -> Self {
        Self {
            restore_date: r.restore_date,
            restored_at: r.restored_at,
            restored_article_ids: r.restored_article_ids,
            restored_article_count: r.restored_article_count,
            failure: r.failure,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestoreParams {
    from: NaiveDate,
    to: NaiveDate,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/articles
pub async fn search(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Json<ArticlePageResponse>, ApiError> {
    let request = parse_search_query(query.as_deref().unwrap_or(""))?;
    let viewer = viewer_id(&headers)?;

    let (page, total) = tokio::try_join!(
        state.search().search(&request),
        state.search().count(&request)
    )?;

    let viewed = match viewer {
        Some(user) => {
            let ids: Vec<Uuid> = page.items.iter().map(|a| a.id).collect();
            state.db().viewed_article_ids(user, &ids).await?
        }
        None => HashSet::new(),
    };

    let content: Vec<ArticleResponse> = page
        .items
        .into_iter()
        .map(|article| {
            let seen = viewed.contains(&article.id);
            ArticleResponse::new(article, seen)
        })
        .collect();

    Ok(Json(ArticlePageResponse {
        size: content.len(),
        content,
        next_cursor: page.next_cursor,
        next_after: page.next_after,
        total_elements: total,
        has_next: page.has_next,
    }))
}

/// GET /api/articles/sources
pub async fn sources(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db().list_sources().await?))
}

/// GET /api/articles/restore?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn restore(
    State(state): State<AppState>,
    params: Result<Query<RestoreParams>, QueryRejection>,
) -> Result<Json<Vec<RestoreResultResponse>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::info!(from = %params.from, to = %params.to, "Restore requested");

    let results = state.restore().restore(params.from, params.to).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

/// POST /api/articles/{id}/article-views
pub async fn register_view(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    headers: HeaderMap,
) -> Result<Json<ArticleResponse>, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user = viewer_id(&headers)?
        .ok_or_else(|| ApiError::BadRequest(format!("{USER_ID_HEADER} header is required")))?;

    let live = state.db().get_article(id).await?.filter(|a| !a.deleted);
    if live.is_none() {
        return Err(article_not_found(id));
    }

    let first_view = state.db().register_view(id, user).await?;
    tracing::debug!(article_id = %id, user_id = %user, first_view, "Article view registered");

    let article = state
        .db()
        .get_article(id)
        .await?
        .ok_or_else(|| article_not_found(id))?;
    Ok(Json(ArticleResponse::new(article, true)))
}

/// DELETE /api/articles/{id}
pub async fn soft_delete(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if state.db().soft_delete_article(id).await? {
        tracing::info!(article_id = %id, "Article soft-deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(article_not_found(id))
    }
}

/// DELETE /api/articles/{id}/hard
pub async fn purge(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if state.db().purge_article(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(article_not_found(id))
    }
}

// ============================================================================
// Request parsing
// ============================================================================

fn article_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Article {id} not found"))
}

fn viewer_id(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("{USER_ID_HEADER} must be a UUID")))
}

/// Build a [`SearchRequest`] from the raw query string.
///
/// `sourceIn` may repeat and each value may hold a comma-separated list.
pub(crate) fn parse_search_query(query: &str) -> Result<SearchRequest, ApiError> {
    let mut request = SearchRequest::default();
    let bad = |name: &str, value: &str| ApiError::BadRequest(format!("Invalid {name}: {value:?}"));

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "keyword" => request.keyword = Some(value.to_string()),
            "interestId" => {
                request.interest_id =
                    Some(Uuid::parse_str(value).map_err(|_| bad("interestId", value))?)
            }
            "sourceIn" => request.source_in.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
            "publishDateFrom" => {
                let bound = parse_bound(value, false).ok_or_else(|| bad("publishDateFrom", value))?;
                request.publish_date_from = Some(bound);
            }
            "publishDateTo" => {
                let bound = parse_bound(value, true).ok_or_else(|| bad("publishDateTo", value))?;
                request.publish_date_to = Some(bound);
            }
            "orderBy" => request.order_by = value.parse()?,
            "direction" => request.direction = Some(value.parse()?),
            "cursor" => request.cursor = Some(value.to_string()),
            "after" => request.after = Some(value.to_string()),
            "limit" => request.limit = Some(value.parse().map_err(|_| bad("limit", value))?),
            other => tracing::debug!(key = %other, "Ignoring unknown query parameter"),
        }
    }
    Ok(request)
}

/// RFC 3339, a naive date-time (UTC), or a bare date. A bare date as an
/// upper bound covers the whole day.
fn parse_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Direction, SortKey};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_query() {
        let interest = Uuid::now_v7();
        let query = format!(
            "keyword=rates&interestId={interest}&sourceIn=Naver&sourceIn=Chosun,Hankyoreh\
             &publishDateFrom=2025-07-01T00:00:00Z&publishDateTo=2025-07-31\
             &orderBy=viewCount&direction=asc&limit=20&cursor=c&after=5"
        );
        let request = parse_search_query(&query).unwrap();

        assert_eq!(request.keyword.as_deref(), Some("rates"));
        assert_eq!(request.interest_id, Some(interest));
        assert_eq!(request.source_in, vec!["Naver", "Chosun", "Hankyoreh"]);
        assert_eq!(
            request.publish_date_from,
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            request.publish_date_to,
            Some(
                Utc.with_ymd_and_hms(2025, 7, 31, 23, 59, 59).unwrap()
                    + chrono::Duration::milliseconds(999)
            )
        );
        assert_eq!(request.order_by, SortKey::ViewCount);
        assert_eq!(request.direction, Some(Direction::Asc));
        assert_eq!(request.limit, Some(20));
        assert_eq!(request.cursor.as_deref(), Some("c"));
        assert_eq!(request.after.as_deref(), Some("5"));
    }

    #[test]
    fn test_empty_query_is_default() {
        let request = parse_search_query("").unwrap();
        assert_eq!(request.order_by, SortKey::PublishDate);
        assert!(request.source_in.is_empty());
        assert!(request.cursor.is_none());
    }

    #[test]
    fn test_encoded_keyword() {
        let request = parse_search_query("keyword=%EA%B2%BD%EC%A0%9C+news").unwrap();
        assert_eq!(request.keyword.as_deref(), Some("경제 news"));
    }

    #[test]
    fn test_bad_values_rejected() {
        for query in [
            "interestId=nope",
            "limit=-1",
            "orderBy=title",
            "direction=sideways",
            "publishDateFrom=yesterday",
        ] {
            assert!(
                matches!(parse_search_query(query), Err(ApiError::BadRequest(_))),
                "{query} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_bound_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 1, 3, 0, 0).unwrap();
        assert_eq!(parse_bound("2025-07-01T12:00:00+09:00", false), Some(expected));
        assert_eq!(parse_bound("2025-07-01T03:00:00", false), Some(expected));
        assert_eq!(
            parse_bound("2025-07-01", false),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_bound("07/01/2025", false), None);
    }
}
