use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::AppResult;
use crate::state::DbPool;

/// The user a live session token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
    pub username: String,
}

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Resolve an unexpired token to its user. Sessions of deleted users resolve to nothing.
pub fn find_session_user(pool: &DbPool, token: &str) -> AppResult<Option<SessionUser>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.user_id, u.username FROM sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(SessionUser {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::User;
    use tempfile::TempDir;

    fn create_test_pool() -> (DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (pool, temp_dir)
    }

    fn insert_user(pool: &DbPool, username: &str) -> String {
        let user = User::new(username.into(), format!("{}@example.com", username), "hash".into());
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (user_id, username, email, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.user_id, user.username, user.email, user.password_hash, user.created_at],
        )
        .unwrap();
        user.user_id
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_round_trip_and_logout() {
        let (pool, _temp) = create_test_pool();
        let user_id = insert_user(&pool, "alice");

        let token = create_session(&pool, &user_id, 1).unwrap();
        let found = find_session_user(&pool, &token).unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.username, "alice");

        delete_session(&pool, &token).unwrap();
        assert!(find_session_user(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let (pool, _temp) = create_test_pool();
        let user_id = insert_user(&pool, "alice");
        let token = create_session(&pool, &user_id, 1).unwrap();

        pool.get()
            .unwrap()
            .execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
                params![token],
            )
            .unwrap();

        assert!(find_session_user(&pool, &token).unwrap().is_none());
        assert_eq!(purge_expired(&pool).unwrap(), 1);
    }
}
