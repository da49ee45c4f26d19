use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

use crate::restore::RestoreError;
use crate::search::SearchError;
use crate::storage::DatabaseError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Handler failure, rendered as `{"error": ...}` with a matching status
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        tracing::error!(error = %e, "Database failure while serving request");
        ApiError::Internal("Database error".to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidCursor(_) | SearchError::InvalidParameter(_) => {
                ApiError::BadRequest(e.to_string())
            }
            SearchError::Database(e) => e.into(),
        }
    }
}

impl From<RestoreError> for ApiError {
    fn from(e: RestoreError) -> Self {
        match e {
            RestoreError::InvalidRange { .. } => ApiError::BadRequest(e.to_string()),
            RestoreError::Database(e) => e.into(),
            RestoreError::Backup(e) => {
                tracing::error!(error = %e, "Restore failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}
