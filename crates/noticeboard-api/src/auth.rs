use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};

use noticeboard_types::api::{LoginRequest, RegisterRequest, StatusMessage, UserResponse};

use crate::error::{ApiError, ApiResult};
use crate::password::{hash_password, verify_password};
use crate::session::SessionUser;
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(req) = payload?;

    if req.username.trim().is_empty() {
        return Err(ApiError::Validation("username must not be empty".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }

    let username = req.username.clone();
    let id = blocking(&state, move |state| {
        // Cheap check first so a taken name doesn't pay for hashing.
        if state.db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::UsernameTaken);
        }

        let password_hash = hash_password(&req.password)?;

        // A concurrent registration can still win the race; the insert reports it.
        state
            .db
            .create_user(&req.username, &password_hash)?
            .ok_or(ApiError::UsernameTaken)
    })
    .await?;

    info!("Registered user '{}' (id {})", username, id);
    Ok(Json(UserResponse { id, username }))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<UserResponse>)> {
    let Json(req) = payload?;

    let attempted = req.username.clone();
    let user = blocking(&state, move |state| {
        let user = state
            .db
            .get_user_by_username(&req.username)?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(&user.password_hash, &req.password) {
            return Err(ApiError::InvalidCredentials);
        }

        Ok(SessionUser {
            user_id: user.id,
            username: user.username,
        })
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::InvalidCredentials) {
            warn!("Rejected login for '{}'", attempted);
        }
    })?;

    let jar = state.sessions.issue(jar, &user)?;

    info!("User '{}' logged in", user.username);
    Ok((
        jar,
        Json(UserResponse {
            id: user.user_id,
            username: user.username,
        }),
    ))
}

/// Works with or without a session; either way the cookie ends up cleared.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<StatusMessage>) {
    if let Some(user) = state.sessions.read(&jar) {
        info!("User '{}' logged out", user.username);
    }

    (state.sessions.clear(jar), Json(StatusMessage::new("logged out")))
}
