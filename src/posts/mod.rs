use serde::Serialize;

use crate::config::FeedConfig;
use crate::db::models::{Post, User};
use crate::error::{AppError, AppResult};
use crate::store::{DynEntityStore, InteractionQuery, PageKey, PostCounters, PostQuery};

pub const MAX_CAPTION_CHARS: usize = 2200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub user_id: String,
    pub username: String,
    pub profile_image: Option<String>,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// A post joined with its author and resolved image URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub image_url: String,
    pub user: AuthorView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub next_key: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostFeed {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub username: String,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPosts {
    pub posts: Vec<PostView>,
    pub user: UserSummary,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct PostService {
    store: DynEntityStore,
    image_base_url: String,
    feed: FeedConfig,
}

impl PostService {
    pub fn new(store: DynEntityStore, image_base_url: impl Into<String>, feed: FeedConfig) -> Self {
        Self {
            store,
            image_base_url: image_base_url.into(),
            feed,
        }
    }

    pub fn image_url(&self, image_key: &str) -> String {
        format!(
            "{}/{}",
            self.image_base_url.trim_end_matches('/'),
            image_key.trim_start_matches('/')
        )
    }

    pub async fn create_post(
        &self,
        user_id: &str,
        image_key: &str,
        caption: Option<&str>,
    ) -> AppResult<PostView> {
        let image_key = image_key.trim();
        if image_key.is_empty() {
            return Err(AppError::validation("image key required"));
        }
        let caption = caption.map(str::trim).filter(|c| !c.is_empty());
        if let Some(c) = caption {
            if c.chars().count() > MAX_CAPTION_CHARS {
                return Err(AppError::validation(format!(
                    "caption must be {} characters or less",
                    MAX_CAPTION_CHARS
                )));
            }
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let post = Post::new(
            user.user_id.clone(),
            image_key.to_string(),
            caption.map(str::to_string),
        );
        self.store.put_post(&post).await?;

        tracing::info!("Post {} created by user {}", post.post_id, user_id);
        Ok(self.view(post, &user))
    }

    pub async fn get_post(&self, post_id: &str) -> AppResult<PostView> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;
        let user = self.store.get_user(&post.user_id).await?.ok_or_else(|| {
            tracing::warn!("User {} not found for post {}", post.user_id, post_id);
            AppError::not_found("post not found")
        })?;
        Ok(self.view(post, &user))
    }

    /// All posts, newest first. Posts whose author is gone are skipped.
    pub async fn get_timeline(
        &self,
        limit: Option<i64>,
        next_key: Option<&str>,
    ) -> AppResult<PostFeed> {
        let limit = self.feed.clamp_limit(limit);
        let page = self
            .store
            .query_posts(&PostQuery {
                author: None,
                after: parse_next_key(next_key),
                limit,
            })
            .await?;

        let mut posts = Vec::with_capacity(page.items.len());
        for post in page.items {
            match self.store.get_user(&post.user_id).await? {
                Some(user) => posts.push(self.view(post, &user)),
                None => tracing::warn!("User {} not found for post {}", post.user_id, post.post_id),
            }
        }

        Ok(PostFeed {
            posts,
            pagination: pagination(limit, page.last_key)?,
        })
    }

    pub async fn get_user_posts(
        &self,
        user_id: &str,
        limit: Option<i64>,
        next_key: Option<&str>,
    ) -> AppResult<UserPosts> {
        let limit = self.feed.clamp_limit(limit);
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let page = self
            .store
            .query_posts(&PostQuery {
                author: Some(user.user_id.clone()),
                after: parse_next_key(next_key),
                limit,
            })
            .await?;

        let posts = page
            .items
            .into_iter()
            .map(|post| self.view(post, &user))
            .collect();

        Ok(UserPosts {
            posts,
            user: UserSummary {
                user_id: user.user_id,
                username: user.username,
                profile_image: user.profile_image,
                bio: user.bio,
            },
            pagination: pagination(limit, page.last_key)?,
        })
    }

    /// Delete a post and every interaction on it. Owner only.
    pub async fn delete_post(&self, user_id: &str, post_id: &str) -> AppResult<()> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;

        if post.user_id != user_id {
            return Err(AppError::Forbidden(
                "only the owner can delete this post".into(),
            ));
        }

        let interactions = self
            .store
            .query_interactions(post_id, &InteractionQuery::all())
            .await?;
        for interaction in &interactions {
            self.store
                .delete_interaction(post_id, &interaction.interaction_id)
                .await?;
        }
        self.store.delete_post(post_id).await?;

        tracing::info!(
            "Post {} deleted by user {} ({} interactions removed)",
            post_id,
            user_id,
            interactions.len()
        );
        Ok(())
    }

    pub async fn get_post_stats(&self, post_id: &str) -> AppResult<PostCounters> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post not found"))?;
        Ok(PostCounters {
            likes_count: post.likes_count,
            comments_count: post.comments_count,
        })
    }

    pub async fn is_owner(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        Ok(self
            .store
            .get_post(post_id)
            .await?
            .is_some_and(|post| post.user_id == user_id))
    }

    fn view(&self, post: Post, user: &User) -> PostView {
        PostView {
            image_url: self.image_url(&post.image_key),
            user: AuthorView::from(user),
            post,
        }
    }
}

fn parse_next_key(raw: Option<&str>) -> Option<PageKey> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match PageKey::decode(raw) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!("Ignoring invalid next_key {:?}: {}", raw, e);
            None
        }
    }
}

fn pagination(limit: usize, last_key: Option<PageKey>) -> AppResult<Pagination> {
    let next_key = last_key.map(|k| k.encode()).transpose()?;
    Ok(Pagination {
        limit,
        has_more: next_key.is_some(),
        next_key,
    })
}
