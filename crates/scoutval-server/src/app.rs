// Shared handler state and router assembly.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use scoutval_core::config::{Config, StatisticsPolicy};
use scoutval_core::db::Database;
use scoutval_core::storage::{self, BlobStore};
use serde_json::json;

use crate::{cors, import, routes};

/// Path of the import endpoint, matching the hosted function it replaces.
pub const IMPORT_PATH: &str = "/functions/v1/process-csv-import";

/// Collaborators injected at startup and shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub blobs: Arc<dyn BlobStore>,
    pub statistics_policy: StatisticsPolicy,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        statistics_policy: StatisticsPolicy,
    ) -> Self {
        Self {
            db,
            blobs,
            statistics_policy,
        }
    }

    /// Build the state from loaded configuration and an opened database.
    pub fn from_config(config: &Config, db: Database) -> Self {
        Self::new(
            Arc::new(db),
            storage::from_config(config),
            config.import.statistics_policy,
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(IMPORT_PATH, post(import::process_csv_import))
        .route("/players", get(routes::list_players))
        .route("/players/search", get(routes::search_players))
        .route("/players/{id}", get(routes::get_player))
        .route("/players/{id}/statistics", get(routes::player_statistics))
        .route(
            "/players/{id}/statistics/{season}",
            get(routes::statistics_for_season),
        )
        .route("/players/{id}/predictions", get(routes::player_predictions))
        .route(
            "/predictions",
            get(routes::user_predictions).post(routes::create_prediction),
        )
        .route(
            "/predictions/{id}",
            put(routes::update_prediction).delete(routes::delete_prediction),
        )
        .route(
            "/profile",
            get(routes::get_profile).put(routes::update_profile),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(cors::cors))
        .with_state(state)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
