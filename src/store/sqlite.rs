use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};

use crate::db::models::{Interaction, InteractionId, InteractionKind, Post, User};
use crate::state::DbPool;
use crate::store::{
    CounterDelta, EntityStore, InteractionQuery, Page, PageKey, PostCounters, PostQuery,
    StoreError,
};

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, profile_image, bio, created_at";
const POST_COLUMNS: &str =
    "post_id, user_id, image_key, caption, likes_count, comments_count, created_at";
const INTERACTION_COLUMNS: &str =
    "post_id, interaction_id, user_id, interaction_type, content, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_image: row.get(4)?,
        bio: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        post_id: row.get(0)?,
        user_id: row.get(1)?,
        image_key: row.get(2)?,
        caption: row.get(3)?,
        likes_count: row.get(4)?,
        comments_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    let kind: String = row.get(3)?;
    let interaction_type = kind
        .parse::<InteractionKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
    Ok(Interaction {
        post_id: row.get(0)?,
        interaction_id: InteractionId::new(row.get::<_, String>(1)?),
        user_id: row.get(2)?,
        interaction_type,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// SQLite-backed entity store. Each call checks out its own pooled connection
/// and runs as a single autocommit statement.
pub struct SqliteEntityStore {
    pool: DbPool,
}

impl SqliteEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn find_user_by(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE {} = ?1 ORDER BY created_at LIMIT 1",
                    USER_COLUMNS, column
                ),
                params![value],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by("user_id", user_id)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by("username", username)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user_by("email", email)
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (user_id, username, email, password_hash, profile_image, bio, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
               username = excluded.username,
               email = excluded.email,
               password_hash = excluded.password_hash,
               profile_image = excluded.profile_image,
               bio = excluded.bio",
            params![
                user.user_id,
                user.username,
                user.email,
                user.password_hash,
                user.profile_image,
                user.bio,
                user.created_at
            ],
        )?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        Ok(rows > 0)
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE post_id = ?1", POST_COLUMNS),
                params![post_id],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    async fn put_post(&self, post: &Post) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (post_id, user_id, image_key, caption, likes_count, comments_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(post_id) DO UPDATE SET
               user_id = excluded.user_id,
               image_key = excluded.image_key,
               caption = excluded.caption,
               likes_count = excluded.likes_count,
               comments_count = excluded.comments_count",
            params![
                post.post_id,
                post.user_id,
                post.image_key,
                post.caption,
                post.likes_count,
                post.comments_count,
                post.created_at
            ],
        )?;
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE post_id = ?1", params![post_id])?;
        Ok(rows > 0)
    }

    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, StoreError> {
        let conn = self.pool.get()?;

        let mut sql = format!("SELECT {} FROM posts WHERE 1 = 1", POST_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        if let Some(ref author) = query.author {
            args.push(Value::Text(author.clone()));
            sql.push_str(&format!(" AND user_id = ?{}", args.len()));
        }
        if let Some(ref after) = query.after {
            args.push(Value::Text(after.created_at.clone()));
            let created_idx = args.len();
            args.push(Value::Text(after.post_id.clone()));
            sql.push_str(&format!(
                " AND (created_at, post_id) < (?{}, ?{})",
                created_idx,
                args.len()
            ));
        }

        // One extra row tells us whether another page exists.
        args.push(Value::Integer(query.limit as i64 + 1));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, post_id DESC LIMIT ?{}",
            args.len()
        ));

        let mut stmt = conn.prepare(&sql)?;
        let mut items = stmt
            .query_map(params_from_iter(args), post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let last_key = if items.len() > query.limit {
            items.truncate(query.limit);
            items.last().map(PageKey::of)
        } else {
            None
        };

        Ok(Page { items, last_key })
    }

    async fn count_user_posts(&self, user_id: &str) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn list_post_ids(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT post_id FROM posts ORDER BY created_at")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn add_post_counters(
        &self,
        post_id: &str,
        delta: CounterDelta,
    ) -> Result<Option<PostCounters>, StoreError> {
        let conn = self.pool.get()?;
        let counters = conn
            .query_row(
                "UPDATE posts
                 SET likes_count = likes_count + ?1,
                     comments_count = comments_count + ?2
                 WHERE post_id = ?3
                 RETURNING likes_count, comments_count",
                params![delta.likes, delta.comments, post_id],
                |row| {
                    Ok(PostCounters {
                        likes_count: row.get(0)?,
                        comments_count: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(counters)
    }

    async fn set_post_counters(
        &self,
        post_id: &str,
        counters: PostCounters,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET likes_count = ?1, comments_count = ?2 WHERE post_id = ?3",
            params![counters.likes_count, counters.comments_count, post_id],
        )?;
        Ok(rows > 0)
    }

    async fn put_interaction(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO interactions (post_id, interaction_id, user_id, interaction_type, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                interaction.post_id,
                interaction.interaction_id.as_str(),
                interaction.user_id,
                interaction.interaction_type.as_str(),
                interaction.content,
                interaction.created_at
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict(format!(
                    "interaction {} already exists on post {}",
                    interaction.interaction_id, interaction.post_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn query_interactions(
        &self,
        post_id: &str,
        query: &InteractionQuery,
    ) -> Result<Vec<Interaction>, StoreError> {
        let conn = self.pool.get()?;

        let mut sql = format!(
            "SELECT {} FROM interactions WHERE post_id = ?1",
            INTERACTION_COLUMNS
        );
        let mut args: Vec<Value> = vec![Value::Text(post_id.to_string())];

        if let Some(ref prefix) = query.id_prefix {
            args.push(Value::Text(prefix.clone()));
            let idx = args.len();
            sql.push_str(&format!(
                " AND substr(interaction_id, 1, length(?{idx})) = ?{idx}"
            ));
        }
        if let Some(kind) = query.kind {
            args.push(Value::Text(kind.as_str().to_string()));
            sql.push_str(&format!(" AND interaction_type = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY created_at, interaction_id");
        if let Some(limit) = query.limit {
            args.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", args.len()));
        }

        let mut stmt = conn.prepare(&sql)?;
        let interactions = stmt
            .query_map(params_from_iter(args), interaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(interactions)
    }

    async fn count_interactions(
        &self,
        post_id: &str,
        kind: InteractionKind,
    ) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE post_id = ?1 AND interaction_type = ?2",
            params![post_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn delete_interaction(
        &self,
        post_id: &str,
        interaction_id: &InteractionId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM interactions WHERE post_id = ?1 AND interaction_id = ?2",
            params![post_id, interaction_id.as_str()],
        )?;
        Ok(rows > 0)
    }
}
