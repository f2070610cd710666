//! Likes and comments, and the denormalized counters they drive.
//!
//! Every mutation is check-then-act: an existence lookup, a write or delete on
//! the interaction record, then an atomic delta on the post counter. The
//! steps are separate store calls. Two concurrent toggles by the same user
//! can both see "not liked" and both insert, leaving a duplicate like and a
//! counter that is one too high. Only the counter delta itself is atomic, so
//! no increment or decrement is ever lost once issued. Drift between the
//! counters and the live records is repaired out of band by [`reconcile`].

pub mod reconcile;

use serde::Serialize;

use crate::db::models::{Interaction, InteractionId, InteractionKind};
use crate::error::{AppError, AppResult};
use crate::store::{CounterDelta, DynEntityStore, InteractionQuery};

pub const MAX_COMMENT_CHARS: usize = 500;
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleLikeResult {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub interaction_id: InteractionId,
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub profile_image: Option<String>,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddCommentResult {
    pub comment: CommentView,
    pub comments_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteCommentResult {
    pub comments_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeView {
    pub user_id: String,
    pub username: String,
    pub profile_image: Option<String>,
    pub created_at: String,
}

/// `likes_count` is the length of the joined list; `total_likes` is the
/// post's counter. They are derived independently and may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostLikes {
    pub likes: Vec<LikeView>,
    pub likes_count: usize,
    pub total_likes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostComments {
    pub comments: Vec<CommentView>,
    pub comments_count: usize,
    pub total_comments: i64,
}

#[derive(Clone)]
pub struct InteractionService {
    store: DynEntityStore,
}

impl InteractionService {
    pub fn new(store: DynEntityStore) -> Self {
        Self { store }
    }

    /// Like the post if the user has no live like on it, otherwise unlike it.
    pub async fn toggle_like(&self, user_id: &str, post_id: &str) -> AppResult<ToggleLikeResult> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;

        let existing = self.find_user_like(user_id, post_id).await?;

        let (liked, delta) = match existing {
            Some(like) => {
                // A concurrent unlike may already have removed it.
                let removed = self
                    .store
                    .delete_interaction(post_id, &like.interaction_id)
                    .await?;
                (false, if removed { -1 } else { 0 })
            }
            None => {
                self.store
                    .put_interaction(&Interaction::like(post_id, user_id))
                    .await?;
                (true, 1)
            }
        };

        let likes_count = self
            .store
            .add_post_counters(post_id, CounterDelta::likes(delta))
            .await?
            .map(|c| c.likes_count)
            .unwrap_or(post.likes_count + delta);

        if liked {
            tracing::info!("User {} liked post {}", user_id, post_id);
        } else {
            tracing::info!("User {} unliked post {}", user_id, post_id);
        }

        Ok(ToggleLikeResult { liked, likes_count })
    }

    pub async fn add_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: &str,
    ) -> AppResult<AddCommentResult> {
        let content = validate_comment(content)?;

        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let comment = Interaction::comment(post_id, user_id, content);
        self.store.put_interaction(&comment).await?;

        let comments_count = self
            .store
            .add_post_counters(post_id, CounterDelta::comments(1))
            .await?
            .map(|c| c.comments_count)
            .unwrap_or(post.comments_count + 1);

        tracing::info!("User {} commented on post {}", user_id, post_id);

        Ok(AddCommentResult {
            comment: CommentView {
                interaction_id: comment.interaction_id,
                post_id: comment.post_id,
                user_id: user.user_id,
                username: user.username,
                profile_image: user.profile_image,
                content: comment.content.unwrap_or_default(),
                created_at: comment.created_at,
            },
            comments_count,
        })
    }

    /// Only the comment's author may delete it. A non-author gets a
    /// validation error, not an authorization error.
    pub async fn delete_comment(
        &self,
        user_id: &str,
        post_id: &str,
        interaction_id: &str,
    ) -> AppResult<DeleteCommentResult> {
        let comments = self
            .store
            .query_interactions(post_id, &InteractionQuery::of_kind(InteractionKind::Comment))
            .await?;

        let comment = comments
            .into_iter()
            .find(|c| c.interaction_id.as_str() == interaction_id)
            .ok_or_else(|| AppError::not_found("comment not found"))?;

        if comment.user_id != user_id {
            return Err(AppError::validation("only own comments can be deleted"));
        }

        let removed = self
            .store
            .delete_interaction(post_id, &comment.interaction_id)
            .await?;
        let delta = if removed { -1 } else { 0 };

        let comments_count = self
            .store
            .add_post_counters(post_id, CounterDelta::comments(delta))
            .await?
            .map(|c| c.comments_count)
            .unwrap_or(0);

        tracing::info!("User {} deleted comment {}", user_id, interaction_id);

        Ok(DeleteCommentResult { comments_count })
    }

    pub async fn get_post_likes(&self, post_id: &str, limit: usize) -> AppResult<PostLikes> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;

        let likes = self
            .store
            .query_interactions(
                post_id,
                &InteractionQuery::of_kind(InteractionKind::Like).limit(limit),
            )
            .await?;

        let mut views = Vec::with_capacity(likes.len());
        for like in likes {
            // Likes by users that no longer exist are dropped from the join.
            if let Some(user) = self.store.get_user(&like.user_id).await? {
                views.push(LikeView {
                    user_id: user.user_id,
                    username: user.username,
                    profile_image: user.profile_image,
                    created_at: like.created_at,
                });
            }
        }

        Ok(PostLikes {
            likes_count: views.len(),
            likes: views,
            total_likes: post.likes_count,
        })
    }

    /// Comments oldest first.
    pub async fn get_post_comments(&self, post_id: &str, limit: usize) -> AppResult<PostComments> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;

        let comments = self
            .store
            .query_interactions(
                post_id,
                &InteractionQuery::of_kind(InteractionKind::Comment).limit(limit),
            )
            .await?;

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            if let Some(user) = self.store.get_user(&comment.user_id).await? {
                views.push(CommentView {
                    interaction_id: comment.interaction_id,
                    post_id: comment.post_id,
                    user_id: user.user_id,
                    username: user.username,
                    profile_image: user.profile_image,
                    content: comment.content.unwrap_or_default(),
                    created_at: comment.created_at,
                });
            }
        }
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(PostComments {
            comments_count: views.len(),
            comments: views,
            total_comments: post.comments_count,
        })
    }

    pub async fn get_user_like_status(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        Ok(self.find_user_like(user_id, post_id).await?.is_some())
    }

    async fn find_user_like(&self, user_id: &str, post_id: &str) -> AppResult<Option<Interaction>> {
        let mut likes = self
            .store
            .query_interactions(post_id, &InteractionQuery::user_like(user_id))
            .await?;
        Ok(likes.pop())
    }
}

/// Trim the comment and enforce the non-empty and length rules.
pub fn validate_comment(content: &str) -> AppResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("comment content required"));
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "comment must be {} characters or less",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}
