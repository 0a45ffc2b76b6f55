// Import endpoint: fetch an uploaded CSV by storage key and run the batch.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use scoutval_import::{import_csv, BatchSummary};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::error::ImportError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub filename: Option<String>,
    /// Acting user, recorded in logs only.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub processed_count: usize,
    pub message: String,
}

impl From<&BatchSummary> for ImportResponse {
    fn from(summary: &BatchSummary) -> Self {
        Self {
            success: true,
            processed_count: summary.committed,
            message: summary.message(),
        }
    }
}

/// `POST` handler. The body is decoded by hand so a malformed payload is
/// reported like any other unexpected failure.
pub async fn process_csv_import(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ImportError> {
    let request: ImportRequest = serde_json::from_slice(&body)
        .map_err(|e| ImportError::Internal(format!("invalid request body: {e}")))?;

    let filename = request
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ImportError::Validation("Filename is required".into()))?;

    info!(
        "Processing CSV file: {filename} for user: {}",
        request.user_id.as_deref().unwrap_or("unknown")
    );

    let summary = run_import(&state, &filename).await?;
    info!(
        "Import of {filename} finished: {} committed, {} skipped",
        summary.committed,
        summary.skipped()
    );

    Ok(Json(ImportResponse::from(&summary)))
}

/// Download `filename` from the blob store and write its rows. The batch runs
/// on the blocking pool since every row write is a synchronous store call.
pub async fn run_import(state: &AppState, filename: &str) -> Result<BatchSummary, ImportError> {
    let bytes = state.blobs.download(filename).await?;

    let db = state.db.clone();
    let policy = state.statistics_policy;
    let summary = tokio::task::spawn_blocking(move || import_csv(&bytes, db.as_ref(), policy))
        .await
        .map_err(|e| ImportError::Internal(format!("import task failed: {e}")))??;

    Ok(summary)
}
