use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::UserPublic;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repository;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserPublic,
}

/// Unknown username and wrong password are reported identically so the
/// endpoint cannot be used to probe for accounts.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = repository::find_by_username(&state.db, &req.username)
        .map_err(|_| AppError::Forbidden("Incorrect username/password".to_string()))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("bcrypt verify failed: {}", e)))?;
    if !valid {
        return Err(AppError::Forbidden(
            "Incorrect username/password".to_string(),
        ));
    }

    let token = state.tokens.issue(user.user_id, user.role)?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: UserPublic::from(user),
    }))
}
