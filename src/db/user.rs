//! User model for sharevault.
//!
//! Users own directories, files and shares. Authentication lives outside
//! this crate; only the identity and quota fields are stored here.

use serde::Serialize;

/// User entity.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique).
    pub username: String,
    /// Storage quota in bytes; `<= 0` means unlimited.
    pub storage_quota: i64,
    /// Bytes currently stored.
    pub storage_used: i64,
    /// Account creation timestamp.
    pub created_at: String,
}

impl User {
    /// Whether the user has no storage limit.
    pub fn has_unlimited_quota(&self) -> bool {
        self.storage_quota <= 0
    }

    /// Remaining bytes, or `None` when unlimited.
    pub fn remaining_quota(&self) -> Option<i64> {
        if self.has_unlimited_quota() {
            None
        } else {
            Some((self.storage_quota - self.storage_used).max(0))
        }
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Storage quota in bytes (defaults to unlimited).
    pub storage_quota: i64,
}

impl NewUser {
    /// Create a new user with an unlimited quota.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            storage_quota: 0,
        }
    }

    /// Set the storage quota.
    pub fn with_quota(mut self, bytes: i64) -> Self {
        self.storage_quota = bytes;
        self
    }
}
