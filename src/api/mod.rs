pub mod articles;
mod error;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::backup::BackupStore;
use crate::restore::RestoreEngine;
use crate::search::SearchEngine;
use crate::storage::Database;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    db: Database,
    search: SearchEngine,
    restore: RestoreEngine,
}

impl AppState {
    pub fn new(db: Database, backup_store: Arc<dyn BackupStore>) -> Self {
        Self {
            search: SearchEngine::new(db.clone()),
            restore: RestoreEngine::new(db.clone(), backup_store),
            db,
        }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub(crate) fn restore(&self) -> &RestoreEngine {
        &self.restore
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/articles", get(articles::search))
        .route("/api/articles/sources", get(articles::sources))
        .route("/api/articles/restore", get(articles::restore))
        .route("/api/articles/{id}", delete(articles::soft_delete))
        .route("/api/articles/{id}/hard", delete(articles::purge))
        .route("/api/articles/{id}/article-views", post(articles::register_view))
        .with_state(state)
}
