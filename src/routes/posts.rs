use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::{ApiJson, ApiQuery, CurrentUser, MaybeUser};
use crate::routes::PageQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub image_key: String,
    pub caption: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> AppResult<Response> {
    let post = state
        .posts
        .create_post(&user.user_id, &req.image_key, req.caption.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "post": post })),
    )
        .into_response())
}

async fn timeline(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Response> {
    let feed = state
        .posts
        .get_timeline(query.limit, query.next_key.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "posts": feed.posts,
        "pagination": feed.pagination,
    }))
    .into_response())
}

/// Signed-in viewers also get whether they have liked the post.
async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post = state.posts.get_post(&post_id).await?;
    let liked = match viewer.user_id() {
        Some(user_id) => Some(
            state
                .interactions
                .get_user_like_status(user_id, &post_id)
                .await?,
        ),
        None => None,
    };
    Ok(Json(json!({ "success": true, "post": post, "liked": liked })).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    state.posts.delete_post(&user.user_id, &post_id).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

async fn post_stats(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let stats = state.posts.get_post_stats(&post_id).await?;
    Ok(Json(json!({ "success": true, "post_id": post_id, "stats": stats })).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(timeline).post(create_post))
        .route("/api/posts/{post_id}", get(get_post).delete(delete_post))
        .route("/api/posts/{post_id}/stats", get(post_stats))
}
