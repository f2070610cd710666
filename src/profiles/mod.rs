use serde::{Deserialize, Serialize};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::store::DynEntityStore;

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_BIO_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub posts_count: i64,
}

/// Fields a user may change on their own profile. `None` leaves the field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.bio.is_none()
            && self.profile_image.is_none()
    }
}

#[derive(Clone)]
pub struct ProfileService {
    store: DynEntityStore,
    bcrypt_cost: u32,
}

impl ProfileService {
    pub fn new(store: DynEntityStore) -> Self {
        Self {
            store,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> AppResult<User> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        // Lookup-before-write; two racing registrations can both pass.
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(username_taken());
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let hash = bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        let user = User::new(username, email, hash);
        self.store.put_user(&user).await?;

        tracing::info!("User {} registered as {}", user.user_id, user.username);
        Ok(user)
    }

    /// Accepts a username or an email address as the login name.
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<User> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::validation("username and password required"));
        }

        let user = match self.store.find_user_by_username(login).await? {
            Some(user) => Some(user),
            None => {
                self.store
                    .find_user_by_email(&login.to_lowercase())
                    .await?
            }
        };

        let user = user.ok_or(AppError::Unauthorized)?;
        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            tracing::warn!("Failed login for {}", login);
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// The email is only included when the viewer is the profile's owner.
    pub async fn get_profile(&self, user_id: &str, viewer: Option<&str>) -> AppResult<Profile> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;
        let posts_count = self.store.count_user_posts(user_id).await?;
        let is_self = viewer == Some(user.user_id.as_str());

        Ok(Profile {
            email: is_self.then_some(user.email),
            user_id: user.user_id,
            username: user.username,
            profile_image: user.profile_image,
            bio: user.bio,
            created_at: user.created_at,
            posts_count,
        })
    }

    pub async fn update_profile(
        &self,
        caller: &str,
        user_id: &str,
        changes: ProfileChanges,
    ) -> AppResult<Profile> {
        if caller != user_id {
            return Err(AppError::Forbidden(
                "only your own profile can be updated".into(),
            ));
        }
        if changes.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }

        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        if let Some(username) = changes.username {
            let username = validate_username(&username)?;
            if username != user.username {
                if let Some(other) = self.store.find_user_by_username(&username).await? {
                    if other.user_id != user.user_id {
                        return Err(username_taken());
                    }
                }
                user.username = username;
            }
        }

        if let Some(email) = changes.email {
            let email = validate_email(&email)?;
            if email != user.email {
                if let Some(other) = self.store.find_user_by_email(&email).await? {
                    if other.user_id != user.user_id {
                        return Err(email_taken());
                    }
                }
                user.email = email;
            }
        }

        if let Some(bio) = changes.bio {
            let bio = bio.trim();
            if bio.chars().count() > MAX_BIO_CHARS {
                return Err(AppError::validation(format!(
                    "bio must be {} characters or less",
                    MAX_BIO_CHARS
                )));
            }
            user.bio = (!bio.is_empty()).then(|| bio.to_string());
        }

        if let Some(image) = changes.profile_image {
            let image = image.trim();
            user.profile_image = (!image.is_empty()).then(|| image.to_string());
        }

        self.store.put_user(&user).await?;
        tracing::info!("User {} updated their profile", user_id);

        self.get_profile(user_id, Some(caller)).await
    }
}

fn validate_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if username.chars().count() < MIN_USERNAME_CHARS {
        return Err(AppError::validation(format!(
            "username must be at least {} characters",
            MIN_USERNAME_CHARS
        )));
    }
    Ok(username.to_string())
}

fn validate_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::validation("a valid email address is required"));
    }
    Ok(email)
}

fn username_taken() -> AppError {
    AppError::Duplicate {
        field: "username",
        message: "username already taken".into(),
    }
}

fn email_taken() -> AppError {
    AppError::Duplicate {
        field: "email",
        message: "email already registered".into(),
    }
}
