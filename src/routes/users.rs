use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{authorize, Policy};
use crate::db::models::{Role, UserPublic};
use crate::error::{AppError, AppResult};
use crate::extractors::AuthUser;
use crate::state::AppState;
use crate::users::repository::{self, NewUser, UserPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users",
            get(list).post(register).put(update_self).delete(delete_self),
        )
        .route("/api/users/token", get(check_token))
        .route(
            "/api/users/{id}",
            get(get_by_id).put(update_user).delete(delete_user),
        )
        .route("/api/users/username/{username}", get(username_available))
        .route("/api/users/email/{email}", get(email_available))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
pub struct UserPatchRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub profile_picture: Option<String>,
    pub profile_info: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserPublic,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct AvailableResponse {
    pub available: bool,
}

fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, 12).map_err(|e| AppError::Internal(format!("bcrypt failed: {}", e)))
}

impl UserPatchRequest {
    fn into_patch(self, allow_role: bool) -> AppResult<UserPatch> {
        let password_hash = match self.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };
        Ok(UserPatch {
            username: self.username,
            email: self.email,
            password_hash,
            // Plain users cannot change their own role
            role: if allow_role { self.role } else { None },
            profile_picture: self.profile_picture,
            profile_info: self.profile_info,
        })
    }
}

async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<UserPublic>>> {
    Ok(Json(repository::list_all(&state.db)?))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserPublic>> {
    Ok(Json(repository::find_by_id(&state.db, id)?))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<UserResponse>> {
    if req.username.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "username, email and password are required".to_string(),
        ));
    }

    let user = repository::create(
        &state.db,
        &NewUser {
            username: req.username,
            email: req.email,
            password_hash: hash_password(&req.password)?,
        },
    )?;

    Ok(Json(UserResponse {
        message: "user created".to_string(),
        user,
    }))
}

/// Self routes act on the identity baked into the token, so ownership holds
/// by construction; the id-scoped routes below go through the policy gate.
async fn update_self(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UserPatchRequest>,
) -> AppResult<Json<UserResponse>> {
    let patch = req.into_patch(auth.claims.role.is_admin())?;
    let user = repository::update(&state.db, auth.claims.sub, &patch)?;
    Ok(Json(UserResponse {
        message: "user updated".to_string(),
        user,
    }))
}

async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UserPatchRequest>,
) -> AppResult<Json<UserResponse>> {
    authorize(&auth.claims, Policy::SelfOrAdmin { owner_id: id })?;

    let patch = req.into_patch(auth.claims.role.is_admin())?;
    let user = repository::update(&state.db, id, &patch)?;
    Ok(Json(UserResponse {
        message: "user updated".to_string(),
        user,
    }))
}

async fn delete_self(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    repository::delete(&state.db, auth.claims.sub)?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    authorize(&auth.claims, Policy::SelfOrAdmin { owner_id: id })?;

    repository::delete(&state.db, id)?;
    Ok(Json(MessageResponse {
        message: "User deleted".to_string(),
    }))
}

/// Confirms the presented token still maps to a live user.
async fn check_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = repository::find_by_id(&state.db, auth.claims.sub)?;
    Ok(Json(UserResponse {
        message: "Token is valid".to_string(),
        user,
    }))
}

async fn username_available(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<AvailableResponse>> {
    let available = match repository::find_by_username(&state.db, &username) {
        Ok(_) => false,
        Err(AppError::NotFound) => true,
        Err(e) => return Err(e),
    };
    Ok(Json(AvailableResponse { available }))
}

async fn email_available(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<AvailableResponse>> {
    let available = match repository::find_by_email(&state.db, &email) {
        Ok(_) => false,
        Err(AppError::NotFound) => true,
        Err(e) => return Err(e),
    };
    Ok(Json(AvailableResponse { available }))
}
