//! User repository for sharevault.

use sqlx::SqlitePool;

use super::user::{NewUser, User};
use crate::{Result, VaultError};

/// Repository for user records.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Duplicate usernames are a conflict.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, storage_quota) VALUES (?, ?) RETURNING id",
        )
        .bind(&new_user.username)
        .bind(new_user.storage_quota)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                VaultError::Conflict("username already taken".to_string())
            }
            other => VaultError::Database(other.to_string()),
        })?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, storage_quota, storage_used, created_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, storage_quota, storage_used, created_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        let user = repo
            .create(&NewUser::new("alice").with_quota(4096))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.storage_quota, 4096);
        assert_eq!(user.storage_used, 0);

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alice");

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());

        repo.create(&NewUser::new("alice")).await.unwrap();
        let result = repo.create(&NewUser::new("alice")).await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool());
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }
}
