// Player, statistics, prediction and profile routes.
//
// The caller's identity comes from the `x-user-id` header set by the
// authenticating gateway in front of this service.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use scoutval_core::db::Database;
use scoutval_core::model::{
    Player, PlayerStatistic, Prediction, PredictionInput, Profile, ProfileUpdate, ValueDifference,
};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    user_id(headers).ok_or(ApiError::Unauthorized)
}

fn require_player(db: &Database, id: i64) -> Result<Player, ApiError> {
    db.get_player(id)?
        .ok_or_else(|| ApiError::NotFound(format!("player {id}")))
}

/// Run a store call on the blocking pool; rusqlite holds the connection
/// mutex for the whole query.
async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("database task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// A player with its estimated-versus-market comparison.
#[derive(Debug, Serialize)]
pub struct PlayerDetail {
    #[serde(flatten)]
    pub player: Player,
    pub value_difference: Option<ValueDifference>,
}

pub async fn list_players(State(state): State<AppState>) -> Result<Json<Vec<Player>>, ApiError> {
    with_db(&state, |db| Ok(db.list_players()?)).await.map(Json)
}

pub async fn search_players(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Player>>, ApiError> {
    with_db(&state, move |db| Ok(db.search_players(params.q.trim())?))
        .await
        .map(Json)
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PlayerDetail>, ApiError> {
    let player = with_db(&state, move |db| require_player(db, id)).await?;
    let value_difference = player.value_difference();
    Ok(Json(PlayerDetail {
        player,
        value_difference,
    }))
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

pub async fn player_statistics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PlayerStatistic>>, ApiError> {
    with_db(&state, move |db| Ok(db.player_statistics(id)?))
        .await
        .map(Json)
}

pub async fn statistics_for_season(
    State(state): State<AppState>,
    Path((id, season)): Path<(i64, String)>,
) -> Result<Json<PlayerStatistic>, ApiError> {
    with_db(&state, move |db| {
        db.statistics_for_season(id, &season)?.ok_or_else(|| {
            ApiError::NotFound(format!("statistics for player {id} season {season}"))
        })
    })
    .await
    .map(Json)
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePrediction {
    pub player_id: i64,
    #[serde(flatten)]
    pub input: PredictionInput,
}

/// The caller's predictions for one player; empty when no user is attached.
pub async fn player_predictions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    let Some(user) = user_id(&headers) else {
        return Ok(Json(Vec::new()));
    };
    with_db(&state, move |db| Ok(db.player_predictions_for_user(id, &user)?))
        .await
        .map(Json)
}

pub async fn user_predictions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    let user = require_user(&headers)?;
    with_db(&state, move |db| Ok(db.user_predictions(&user)?))
        .await
        .map(Json)
}

pub async fn create_prediction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePrediction>,
) -> Result<(StatusCode, Json<Prediction>), ApiError> {
    let user = require_user(&headers)?;
    let prediction = with_db(&state, move |db| {
        require_player(db, body.player_id)?;
        Ok(db.create_prediction(&user, body.player_id, &body.input)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(prediction)))
}

pub async fn update_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(input): Json<PredictionInput>,
) -> Result<Json<Prediction>, ApiError> {
    let user = require_user(&headers)?;
    with_db(&state, move |db| {
        db.update_prediction(id, &user, &input)?
            .ok_or_else(|| ApiError::NotFound(format!("prediction {id}")))
    })
    .await
    .map(Json)
}

pub async fn delete_prediction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = require_user(&headers)?;
    let removed = with_db(&state, move |db| Ok(db.delete_prediction(id, &user)?)).await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("prediction {id}")))
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The caller's profile, or `null` when signed out or never saved.
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<Profile>>, ApiError> {
    let Some(user) = user_id(&headers) else {
        return Ok(Json(None));
    };
    with_db(&state, move |db| Ok(db.get_profile(&user)?))
        .await
        .map(Json)
}

pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    let user = require_user(&headers)?;
    with_db(&state, move |db| Ok(db.update_profile(&user, &update)?))
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use scoutval_core::config::StatisticsPolicy;
    use scoutval_core::db::Database;
    use scoutval_core::model::NewPlayer;
    use scoutval_core::storage::{BlobStore, StorageError};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct NoBlobs;

    #[async_trait]
    impl BlobStore for NoBlobs {
        async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound {
                key: key.to_string(),
            })
        }
    }

    fn seeded_state() -> (AppState, i64) {
        let db = Database::open(":memory:").unwrap();
        let id = db
            .upsert_player(&NewPlayer {
                name: "Jane Doe".into(),
                age: 22,
                position: "Midfielder".into(),
                club: "Club X".into(),
                club_logo: None,
                nationality: "Countryland".into(),
                nationality_flag: None,
                market_value: 5_000_000,
                image_url: None,
            })
            .unwrap();
        let state = AppState::new(Arc::new(db), Arc::new(NoBlobs), StatisticsPolicy::Present);
        (state, id)
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn list_and_search_players() {
        let (state, _) = seeded_state();

        let (status, json) = send(&state, "GET", "/players", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (_, json) = send(&state, "GET", "/players/search?q=jane", None, None).await;
        assert_eq!(json[0]["name"], "Jane Doe");

        let (_, json) = send(&state, "GET", "/players/search?q=zzz", None, None).await;
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_player_includes_value_difference() {
        let (state, id) = seeded_state();

        let (status, json) = send(&state, "GET", &format!("/players/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Jane Doe");
        assert!(json["value_difference"].is_null());

        let (status, json) = send(&state, "GET", "/players/999", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "player 999 not found");
    }

    #[tokio::test]
    async fn statistics_routes() {
        let (state, id) = seeded_state();
        state
            .db
            .upsert_statistics(&scoutval_core::model::NewPlayerStatistic {
                player_id: id,
                season: "2024-25".into(),
                goals: 3,
                assists: 1,
                appearances: 10,
                minutes_played: 0,
                pass_accuracy: None,
                tackles: 0,
                interceptions: 0,
            })
            .unwrap();

        let (_, json) = send(&state, "GET", &format!("/players/{id}/statistics"), None, None).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (status, json) = send(
            &state,
            "GET",
            &format!("/players/{id}/statistics/2024-25"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["goals"], 3);

        let (status, _) = send(
            &state,
            "GET",
            &format!("/players/{id}/statistics/1999-00"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prediction_crud() {
        let (state, id) = seeded_state();
        let body = json!({ "player_id": id, "predicted_value": 6_000_000, "confidence_score": 0.7 });

        let (status, _) = send(&state, "POST", "/predictions", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, created) = send(&state, "POST", "/predictions", Some("user-1"), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["predicted_value"], 6_000_000);
        let pred_id = created["id"].as_i64().unwrap();

        let (status, updated) = send(
            &state,
            "PUT",
            &format!("/predictions/{pred_id}"),
            Some("user-1"),
            Some(json!({ "predicted_value": 6_500_000, "notes": "revised" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["predicted_value"], 6_500_000);
        assert_eq!(updated["notes"], "revised");

        let (_, mine) = send(&state, "GET", "/predictions", Some("user-1"), None).await;
        assert_eq!(mine[0]["player"]["name"], "Jane Doe");

        let (_, anon) = send(&state, "GET", &format!("/players/{id}/predictions"), None, None).await;
        assert!(anon.as_array().unwrap().is_empty());

        let (status, _) = send(
            &state,
            "DELETE",
            &format!("/predictions/{pred_id}"),
            Some("user-2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &state,
            "DELETE",
            &format!("/predictions/{pred_id}"),
            Some("user-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn prediction_for_unknown_player_is_404() {
        let (state, _) = seeded_state();
        let (status, _) = send(
            &state,
            "POST",
            "/predictions",
            Some("user-1"),
            Some(json!({ "player_id": 404, "predicted_value": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_and_cors_headers() {
        let (state, _) = seeded_state();

        let resp = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri(crate::app::IMPORT_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            resp.headers()["access-control-allow-headers"],
            crate::cors::ALLOW_HEADERS
        );
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());

        let resp = router(state)
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn profile_read_and_partial_update() {
        let (state, _) = seeded_state();

        let (status, json) = send(&state, "GET", "/profile", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.is_null());

        let (status, _) = send(
            &state,
            "PUT",
            "/profile",
            None,
            Some(json!({ "full_name": "Jane Scout" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, json) = send(&state, "GET", "/profile", Some("user-1"), None).await;
        assert!(json.is_null());

        let (status, created) = send(
            &state,
            "PUT",
            "/profile",
            Some("user-1"),
            Some(json!({ "full_name": "Jane Scout", "avatar_url": "https://img.example/a.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], "user-1");

        let (_, updated) = send(
            &state,
            "PUT",
            "/profile",
            Some("user-1"),
            Some(json!({ "avatar_url": "https://img.example/b.png" })),
        )
        .await;
        assert_eq!(updated["full_name"], "Jane Scout");
        assert_eq!(updated["avatar_url"], "https://img.example/b.png");

        let (_, fetched) = send(&state, "GET", "/profile", Some("user-1"), None).await;
        assert_eq!(fetched, updated);
    }
}
