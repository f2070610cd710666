use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current UTC time as RFC 3339 with microseconds. Fixed width, so string
/// order is chronological order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            user_id: generate_id(),
            username,
            email,
            password_hash,
            profile_image: None,
            bio: None,
            created_at: timestamp_now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub user_id: String,
    pub image_key: String,
    pub caption: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: String,
}

impl Post {
    pub fn new(user_id: String, image_key: String, caption: Option<String>) -> Self {
        Self {
            post_id: generate_id(),
            user_id,
            image_key,
            caption,
            likes_count: 0,
            comments_count: 0,
            created_at: timestamp_now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Comment,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Like => "like",
            InteractionKind::Comment => "comment",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionKind::Like),
            "comment" => Ok(InteractionKind::Comment),
            other => Err(format!("unknown interaction type: {}", other)),
        }
    }
}

/// Sort key of an interaction within its post: `{type}#{user_id}#{created_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(pub String);

impl InteractionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn compose(kind: InteractionKind, user_id: &str, created_at: &str) -> Self {
        Self(format!("{}#{}#{}", kind, user_id, created_at))
    }

    /// Prefix shared by every like a user has placed on a post.
    pub fn like_prefix(user_id: &str) -> String {
        format!("{}#{}#", InteractionKind::Like, user_id)
    }

    /// Splits the id back into (kind, user_id, created_at).
    pub fn parts(&self) -> Option<(InteractionKind, &str, &str)> {
        let mut split = self.0.splitn(3, '#');
        let kind = split.next()?.parse().ok()?;
        let user_id = split.next()?;
        let created_at = split.next()?;
        if user_id.is_empty() || created_at.is_empty() {
            return None;
        }
        Some((kind, user_id, created_at))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub post_id: String,
    pub interaction_id: InteractionId,
    pub user_id: String,
    pub interaction_type: InteractionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: String,
}

impl Interaction {
    pub fn like(post_id: &str, user_id: &str) -> Self {
        Self::build(post_id, user_id, InteractionKind::Like, None)
    }

    pub fn comment(post_id: &str, user_id: &str, content: String) -> Self {
        Self::build(post_id, user_id, InteractionKind::Comment, Some(content))
    }

    fn build(
        post_id: &str,
        user_id: &str,
        kind: InteractionKind,
        content: Option<String>,
    ) -> Self {
        let created_at = timestamp_now();
        Self {
            post_id: post_id.to_string(),
            interaction_id: InteractionId::compose(kind, user_id, &created_at),
            user_id: user_id.to_string(),
            interaction_type: kind,
            content,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_id_has_type_user_and_timestamp() {
        let like = Interaction::like("post-1", "user-1");
        let expected = format!("like#user-1#{}", like.created_at);
        assert_eq!(like.interaction_id.as_str(), expected);
        assert!(like.content.is_none());
    }

    #[test]
    fn like_prefix_matches_only_that_users_likes() {
        let like = Interaction::like("post-1", "user-1");
        let prefix = InteractionId::like_prefix("user-1");
        assert!(like.interaction_id.as_str().starts_with(&prefix));

        let other = Interaction::like("post-1", "user-10");
        assert!(!other.interaction_id.as_str().starts_with(&prefix));

        let comment = Interaction::comment("post-1", "user-1", "hi".into());
        assert!(!comment.interaction_id.as_str().starts_with(&prefix));
    }

    #[test]
    fn parts_round_trip() {
        let comment = Interaction::comment("post-1", "user-1", "hi".into());
        let (kind, user, ts) = comment.interaction_id.parts().unwrap();
        assert_eq!(kind, InteractionKind::Comment);
        assert_eq!(user, "user-1");
        assert_eq!(ts, comment.created_at);
    }

    #[test]
    fn parts_rejects_garbage() {
        assert!(InteractionId::new("nope").parts().is_none());
        assert!(InteractionId::new("share#u#t").parts().is_none());
        assert!(InteractionId::new("like##t").parts().is_none());
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let a = timestamp_now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = timestamp_now();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn user_serialization_omits_password_hash() {
        let user = User::new("alice".into(), "a@example.com".into(), "secret".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
    }
}
