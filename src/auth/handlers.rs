use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{session, SESSION_COOKIE};
use crate::db::models::User;
use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: String,
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours.saturating_mul(3600);
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

fn clear_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

fn signed_in(state: &AppState, status: StatusCode, user: &User) -> AppResult<Response> {
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.user_id, hours)?;
    Ok((
        status,
        [(header::SET_COOKIE, session_cookie(&token, hours))],
        Json(json!({ "success": true, "user": user, "token": token })),
    )
        .into_response())
}

// -- Handlers --

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let user = state
        .profiles
        .register(&req.username, &req.email, &req.password)
        .await?;
    signed_in(&state, StatusCode::CREATED, &user)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let user = state
        .profiles
        .authenticate(&req.username, &req.password)
        .await?;
    tracing::info!("User {} logged in", user.username);
    signed_in(&state, StatusCode::OK, &user)
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.token)?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "success": true })),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let profile = state
        .profiles
        .get_profile(&user.user_id, Some(&user.user_id))
        .await?;
    Ok(Json(json!({ "success": true, "user": profile })).into_response())
}
