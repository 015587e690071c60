//! User directory and account creation

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::user::{CreateUser, User, UserSummary},
    repository::UserStore,
};

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UserStore>,
}

impl UsersService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// All users, newest first
    pub async fn list(&self) -> AppResult<Vec<UserSummary>> {
        let users = self.users.list().await?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<UserSummary> {
        self.users
            .get(id)
            .await?
            .map(UserSummary::from)
            .ok_or_else(|| AppError::not_found(EntityKind::User, id))
    }

    /// Create a user. The password is stored hashed and never returned.
    pub async fn create(&self, input: CreateUser) -> AppResult<UserSummary> {
        let password_hash = hash_password(&input.password)?;
        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            created_at: Utc::now(),
        };

        let created = self.users.create(&user, &password_hash).await?;
        tracing::info!(user_id = %created.id, username = %created.username, "User created");
        Ok(created.into())
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
