use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{authorize, Policy};
use crate::db::models::Follow;
use crate::error::AppResult;
use crate::extractors::AuthUser;
use crate::social::repository;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/follows", post(follow).delete(unfollow))
        .route("/api/follows/followers/{id}", get(followers))
        .route("/api/follows/followings/{id}", get(followings))
        .route("/api/follows/followers/count/{id}", get(followers_count))
        .route("/api/follows/followings/count/{id}", get(followings_count))
}

#[derive(Deserialize)]
pub struct FollowRequest {
    pub follower_id: i64,
    pub following_id: i64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}

async fn followers(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Follow>>> {
    Ok(Json(repository::list_followers(&state.db, id)?))
}

async fn followings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Follow>>> {
    Ok(Json(repository::list_followings(&state.db, id)?))
}

async fn followers_count(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CountResponse>> {
    Ok(Json(CountResponse {
        count: repository::count_followers(&state.db, id)?,
    }))
}

async fn followings_count(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CountResponse>> {
    Ok(Json(CountResponse {
        count: repository::count_followings(&state.db, id)?,
    }))
}

/// Only the follower themselves (or an Admin) may create or remove the edge.
async fn follow(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<MessageResponse>> {
    authorize(
        &auth.claims,
        Policy::SelfOrAdmin {
            owner_id: req.follower_id,
        },
    )?;

    repository::follow(&state.db, req.follower_id, req.following_id)?;
    Ok(Json(MessageResponse {
        message: "Follower added".to_string(),
    }))
}

async fn unfollow(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<MessageResponse>> {
    authorize(
        &auth.claims,
        Policy::SelfOrAdmin {
            owner_id: req.follower_id,
        },
    )?;

    repository::unfollow(&state.db, req.follower_id, req.following_id)?;
    Ok(Json(MessageResponse {
        message: "User unfollowed".to_string(),
    }))
}
