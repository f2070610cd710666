//! Entity persistence for users, posts and interactions.
//!
//! The store offers get/put/query/delete primitives plus one atomic
//! counter delta on posts. Nothing here spans more than one record: callers
//! that need check-then-act get no isolation between the check and the act.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{Interaction, InteractionId, InteractionKind, Post, User};

pub use sqlite::SqliteEntityStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Signed adjustment applied to a post's counters in one atomic statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub likes: i64,
    pub comments: i64,
}

impl CounterDelta {
    pub fn likes(delta: i64) -> Self {
        Self {
            likes: delta,
            comments: 0,
        }
    }

    pub fn comments(delta: i64) -> Self {
        Self {
            likes: 0,
            comments: delta,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounters {
    pub likes_count: i64,
    pub comments_count: i64,
}

/// Interactions of one post, optionally narrowed by type and sort-key prefix.
/// Results come back oldest first, and `limit` keeps the oldest matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionQuery {
    pub kind: Option<InteractionKind>,
    pub id_prefix: Option<String>,
    pub limit: Option<usize>,
}

impl InteractionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: InteractionKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The live like (if any) that `user_id` has on the post.
    pub fn user_like(user_id: &str) -> Self {
        Self {
            kind: Some(InteractionKind::Like),
            id_prefix: Some(InteractionId::like_prefix(user_id)),
            limit: Some(1),
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Newest-first post listing, optionally restricted to one author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub author: Option<String>,
    pub after: Option<PageKey>,
    pub limit: usize,
}

/// Position of the last post on a page. The next page starts strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageKey {
    pub created_at: String,
    pub post_id: String,
}

impl PageKey {
    pub fn of(post: &Post) -> Self {
        Self {
            created_at: post.created_at.clone(),
            post_id: post.post_id.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub last_key: Option<PageKey>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert or overwrite a user record.
    async fn put_user(&self, user: &User) -> Result<(), StoreError>;

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError>;

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, StoreError>;

    /// Insert or overwrite a post record, counters included.
    async fn put_post(&self, post: &Post) -> Result<(), StoreError>;

    async fn delete_post(&self, post_id: &str) -> Result<bool, StoreError>;

    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, StoreError>;

    async fn count_user_posts(&self, user_id: &str) -> Result<i64, StoreError>;

    async fn list_post_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Atomically add `delta` to the post's counters and return the new values.
    /// Concurrent deltas commute. Returns `None` when the post does not exist.
    async fn add_post_counters(
        &self,
        post_id: &str,
        delta: CounterDelta,
    ) -> Result<Option<PostCounters>, StoreError>;

    /// Overwrite the counters. Only for out-of-band repair.
    async fn set_post_counters(
        &self,
        post_id: &str,
        counters: PostCounters,
    ) -> Result<bool, StoreError>;

    /// Insert a new interaction. Fails with `Conflict` when the composite key
    /// `(post_id, interaction_id)` already exists.
    async fn put_interaction(&self, interaction: &Interaction) -> Result<(), StoreError>;

    async fn query_interactions(
        &self,
        post_id: &str,
        query: &InteractionQuery,
    ) -> Result<Vec<Interaction>, StoreError>;

    async fn count_interactions(
        &self,
        post_id: &str,
        kind: InteractionKind,
    ) -> Result<i64, StoreError>;

    async fn delete_interaction(
        &self,
        post_id: &str,
        interaction_id: &InteractionId,
    ) -> Result<bool, StoreError>;
}

pub type DynEntityStore = Arc<dyn EntityStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_like_query_targets_single_prefix() {
        let q = InteractionQuery::user_like("u1");
        assert_eq!(q.kind, Some(InteractionKind::Like));
        assert_eq!(q.id_prefix.as_deref(), Some("like#u1#"));
        assert_eq!(q.limit, Some(1));
    }

    #[test]
    fn page_key_survives_encoding() {
        let key = PageKey {
            created_at: "2025-01-01T00:00:00.000000Z".into(),
            post_id: "p1".into(),
        };
        let raw = key.encode().unwrap();
        assert_eq!(PageKey::decode(&raw).unwrap(), key);
        assert!(PageKey::decode("not json").is_err());
    }
}
