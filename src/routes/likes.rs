use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extractors::AuthUser;
use crate::posts::repository;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/likes", post(like))
        .route("/api/likes/{post_id}", delete(unlike))
        .route("/api/likes/count/{post_id}", get(count))
}

#[derive(Deserialize)]
pub struct LikeRequest {
    pub post_id: i64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}

async fn like(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<LikeRequest>,
) -> AppResult<Json<MessageResponse>> {
    repository::like(&state.db, req.post_id, auth.claims.sub)?;
    Ok(Json(MessageResponse {
        message: "Like added".to_string(),
    }))
}

async fn unlike(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    repository::unlike(&state.db, post_id, auth.claims.sub)?;
    Ok(Json(MessageResponse {
        message: "Like removed".to_string(),
    }))
}

async fn count(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<CountResponse>> {
    Ok(Json(CountResponse {
        count: repository::count_likes(&state.db, post_id)?,
    }))
}
