//! Share and access-log repositories.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::model::{Share, ShareAccessLog};
use super::scope::{PermissionType, ResourceType, ShareAction};
use crate::{Result, VaultError};

const SHARE_COLUMNS: &str = "id, owner_id, resource_type, resource_id, token, permission_type, \
                             password_hash, expires_at, access_count, created_at";

/// Data for inserting a share row.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub owner_id: i64,
    pub resource_type: ResourceType,
    pub resource_id: i64,
    pub token: String,
    pub permission_type: PermissionType,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository for share records.
pub struct ShareRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShareRepository<'a> {
    /// Create a new ShareRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a share with `access_count = 0`. A duplicate token is a conflict.
    pub async fn create(&self, share: &NewShare) -> Result<Share> {
        let sql = format!(
            "INSERT INTO shares
                (owner_id, resource_type, resource_id, token, permission_type, password_hash, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {SHARE_COLUMNS}"
        );
        sqlx::query_as::<_, Share>(&sql)
            .bind(share.owner_id)
            .bind(share.resource_type.as_str())
            .bind(share.resource_id)
            .bind(&share.token)
            .bind(share.permission_type.as_str())
            .bind(&share.password_hash)
            .bind(share.expires_at)
            .fetch_one(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    VaultError::Conflict("share token already in use".to_string())
                }
                other => other.into(),
            })
    }

    /// Get a share by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Share>> {
        let sql = format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = ?");
        let share = sqlx::query_as::<_, Share>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(share)
    }

    /// Get a share by token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Share>> {
        let sql = format!("SELECT {SHARE_COLUMNS} FROM shares WHERE token = ?");
        let share = sqlx::query_as::<_, Share>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?;
        Ok(share)
    }

    /// Whether any share uses `token`.
    pub async fn token_exists(&self, token: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shares WHERE token = ?)")
            .bind(token)
            .fetch_one(self.pool)
            .await?;
        Ok(exists != 0)
    }

    /// Shares issued by `owner_id`, newest first, optionally by resource type.
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        resource_type: Option<ResourceType>,
    ) -> Result<Vec<Share>> {
        let sql = format!(
            "SELECT {SHARE_COLUMNS} FROM shares
             WHERE owner_id = ?1 AND (?2 IS NULL OR resource_type = ?2)
             ORDER BY id DESC"
        );
        let shares = sqlx::query_as::<_, Share>(&sql)
            .bind(owner_id)
            .bind(resource_type.map(|t| t.as_str()))
            .fetch_all(self.pool)
            .await?;
        Ok(shares)
    }

    /// Shares pointing at one resource.
    pub async fn list_by_resource(
        &self,
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<Vec<Share>> {
        let sql = format!(
            "SELECT {SHARE_COLUMNS} FROM shares
             WHERE resource_type = ? AND resource_id = ? ORDER BY id"
        );
        let shares = sqlx::query_as::<_, Share>(&sql)
            .bind(resource_type.as_str())
            .bind(resource_id)
            .fetch_all(self.pool)
            .await?;
        Ok(shares)
    }

    /// Replace the expiration (`None` clears it).
    pub async fn update_expiration(
        &self,
        id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE shares SET expires_at = ? WHERE id = ?")
            .bind(expires_at)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one to the access counter in a single statement and return the
    /// new value.
    pub async fn increment_access_count(&self, id: i64) -> Result<Option<i64>> {
        let count = sqlx::query_scalar(
            "UPDATE shares SET access_count = access_count + 1 WHERE id = ? RETURNING access_count",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(count)
    }

    /// Delete a share. Its access logs go with it.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Data for appending an access-log row.
#[derive(Debug, Clone)]
pub struct NewAccessLog {
    pub share_id: i64,
    pub action: ShareAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub file_name: Option<String>,
    pub granted: bool,
}

/// Append-only repository for share access logs.
pub struct AccessLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccessLogRepository<'a> {
    /// Create a new AccessLogRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a log row.
    pub async fn insert(&self, entry: &NewAccessLog) -> Result<i64> {
        let id = sqlx::query_scalar(
            "INSERT INTO share_access_logs
                (share_id, ip_address, user_agent, action, file_name, granted)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(entry.share_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.action.as_str())
        .bind(&entry.file_name)
        .bind(entry.granted)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Most recent log rows for a share, newest first.
    pub async fn list_by_share(&self, share_id: i64, limit: i64) -> Result<Vec<ShareAccessLog>> {
        let logs = sqlx::query_as::<_, ShareAccessLog>(
            "SELECT id, share_id, accessed_at, ip_address, user_agent, action, file_name, granted
             FROM share_access_logs WHERE share_id = ?
             ORDER BY id DESC LIMIT ?",
        )
        .bind(share_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(logs)
    }

    /// Number of log rows for a share.
    pub async fn count(&self, share_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM share_access_logs WHERE share_id = ?")
            .bind(share_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
