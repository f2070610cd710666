use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::{ApiJson, ApiQuery, CurrentUser, MaybeUser};
use crate::profiles::ProfileChanges;
use crate::routes::PageQuery;
use crate::state::AppState;

async fn get_profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(user_id): Path<String>,
) -> AppResult<Response> {
    let profile = state
        .profiles
        .get_profile(&user_id, viewer.user_id())
        .await?;
    Ok(Json(json!({ "success": true, "user": profile })).into_response())
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
    ApiJson(changes): ApiJson<ProfileChanges>,
) -> AppResult<Response> {
    let profile = state
        .profiles
        .update_profile(&user.user_id, &user_id, changes)
        .await?;
    Ok(Json(json!({ "success": true, "user": profile })).into_response())
}

async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Response> {
    let result = state
        .posts
        .get_user_posts(&user_id, query.limit, query.next_key.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "user": result.user,
        "posts": result.posts,
        "pagination": result.pagination,
    }))
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users/{user_id}",
            get(get_profile).put(update_profile),
        )
        .route("/api/users/{user_id}/posts", get(user_posts))
}
