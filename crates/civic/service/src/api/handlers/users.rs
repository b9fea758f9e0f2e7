//! Signup and profile handlers

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use civic_identity::{ProfileUpdate, RegistrationRequest};
use civic_types::{User, UserId};

/// Register a new account
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.identity.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn current_user(user: CurrentUser) -> Json<User> {
    Json(user.0)
}

pub async fn update_current_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let updated = state.identity.update_profile(&user.0.id, update).await?;
    Ok(Json(updated))
}

/// Look up a user; government may see anyone, others only themselves
pub async fn get_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = UserId::new(id);
    caller.require_self_or_government(&id)?;
    let user = state
        .identity
        .lookup(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(user))
}
