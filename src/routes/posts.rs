use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::AuthUser;
use crate::posts::repository::{self, NewPost, PostPatch};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list).post(create))
        .route("/api/posts/mostliked", get(most_liked))
        .route("/api/posts/user/{id}", get(list_by_user))
        .route(
            "/api/posts/{id}",
            get(get_by_id).put(update).delete(delete_post),
        )
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub filename: String,
    pub continent: String,
    pub country: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
}

#[derive(Deserialize, Default)]
pub struct PostPatchRequest {
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn parse_trip_dates(start: &str, end: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("invalid date: {}", s)))
    };
    Ok((parse(start)?, parse(end)?))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Post>>> {
    if query.limit.is_some_and(|l| l < 1) || query.page.is_some_and(|p| p < 1) {
        return Err(AppError::BadRequest(
            "page and limit must be positive".to_string(),
        ));
    }
    Ok(Json(repository::list(&state.db, query.page, query.limit)?))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Post>> {
    Ok(Json(repository::find_by_id(&state.db, id)?))
}

async fn list_by_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(repository::list_by_user(&state.db, id)?))
}

async fn most_liked(State(state): State<AppState>) -> AppResult<Json<Post>> {
    Ok(Json(repository::most_liked(&state.db)?))
}

/// The image artifact is uploaded to the upload server beforehand; this
/// records its filename alongside the trip metadata. The owner is always
/// the authenticated requester.
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<Post>> {
    if req.filename.is_empty() {
        return Err(AppError::BadRequest("filename is required".to_string()));
    }
    let (start, end) = parse_trip_dates(&req.start_date, &req.end_date)?;
    if end < start {
        return Err(AppError::BadRequest(
            "end_date must not precede start_date".to_string(),
        ));
    }

    let post = repository::create(
        &state.db,
        &NewPost {
            user_id: auth.claims.sub,
            filename: req.filename,
            continent: req.continent,
            country: req.country,
            city: req.city,
            latitude: req.latitude,
            longitude: req.longitude,
            start_date: req.start_date,
            end_date: req.end_date,
            description: req.description,
        },
    )?;
    Ok(Json(post))
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<PostPatchRequest>,
) -> AppResult<Json<Post>> {
    let patch = PostPatch {
        country: req.country,
        city: req.city,
        description: req.description,
    };
    Ok(Json(repository::update(
        &state.db,
        id,
        &patch,
        &auth.claims,
    )?))
}

async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    repository::delete(
        &state.db,
        state.artifacts.as_ref(),
        id,
        &auth.claims,
        &auth.bearer_token,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Media deleted".to_string(),
    }))
}
