use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::{ApiJson, ApiQuery, CurrentUser};
use crate::interactions::DEFAULT_LIST_LIMIT;
use crate::routes::LimitQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommentRequest {
    /// Missing content is treated as empty and rejected by validation.
    #[serde(default)]
    pub content: String,
}

fn list_limit(query: &LimitQuery) -> usize {
    match query.limit {
        Some(n) if n >= 1 => n as usize,
        _ => DEFAULT_LIST_LIMIT,
    }
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let result = state
        .interactions
        .toggle_like(&user.user_id, &post_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "liked": result.liked,
        "likes_count": result.likes_count,
    }))
    .into_response())
}

async fn list_likes(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Response> {
    let likes = state
        .interactions
        .get_post_likes(&post_id, list_limit(&query))
        .await?;
    Ok(Json(json!({
        "success": true,
        "post_id": post_id,
        "likes": likes.likes,
        "likes_count": likes.likes_count,
        "total_likes": likes.total_likes,
    }))
    .into_response())
}

async fn like_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let liked = state
        .interactions
        .get_user_like_status(&user.user_id, &post_id)
        .await?;
    Ok(Json(json!({ "success": true, "post_id": post_id, "liked": liked })).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> AppResult<Response> {
    let result = state
        .interactions
        .add_comment(&user.user_id, &post_id, &req.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "comment": result.comment,
            "comments_count": result.comments_count,
        })),
    )
        .into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Response> {
    let comments = state
        .interactions
        .get_post_comments(&post_id, list_limit(&query))
        .await?;
    Ok(Json(json!({
        "success": true,
        "post_id": post_id,
        "comments": comments.comments,
        "comments_count": comments.comments_count,
        "total_comments": comments.total_comments,
    }))
    .into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((post_id, interaction_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let result = state
        .interactions
        .delete_comment(&user.user_id, &post_id, &interaction_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "comments_count": result.comments_count,
    }))
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts/{post_id}/like", post(toggle_like))
        .route("/api/posts/{post_id}/likes", get(list_likes))
        .route("/api/posts/{post_id}/like-status", get(like_status))
        .route(
            "/api/posts/{post_id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/posts/{post_id}/comments/{interaction_id}",
            delete(delete_comment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limit_defaults_to_fifty() {
        assert_eq!(list_limit(&LimitQuery { limit: None }), 50);
        assert_eq!(list_limit(&LimitQuery { limit: Some(0) }), 50);
        assert_eq!(list_limit(&LimitQuery { limit: Some(5) }), 5);
    }
}
