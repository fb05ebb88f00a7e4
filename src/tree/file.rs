//! File records and repository.

use serde::Serialize;
use sqlx::SqliteExecutor;

use crate::sanitize::is_dangerous_extension;
use crate::{Result, VaultError};

const FILE_COLUMNS: &str = "id, name, path, owner_id, parent_id, size, mime_type, storage_key, \
                            bucket, checksum, created_at, updated_at";

/// Metadata for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileEntry {
    /// Unique file ID.
    pub id: i64,
    /// Filename (a sanitized single component).
    pub name: String,
    /// Materialized path including the filename.
    pub path: String,
    /// Owning user.
    pub owner_id: i64,
    /// Containing directory (`None` at the user's root).
    pub parent_id: Option<i64>,
    /// Size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Object store key. Never shown to share recipients.
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// Bucket/location identifier.
    #[serde(skip_serializing)]
    pub bucket: String,
    /// SHA-256 of the content, lowercase hex.
    pub checksum: String,
    /// Upload timestamp.
    pub created_at: String,
    /// Last rename/move timestamp.
    pub updated_at: String,
}

impl FileEntry {
    /// Advisory flag for clients: the extension looks executable.
    pub fn is_dangerous(&self) -> bool {
        is_dangerous_extension(&self.name)
    }
}

/// Data for inserting a file row.
#[derive(Debug, Clone)]
pub struct NewFileEntry {
    pub name: String,
    pub path: String,
    pub owner_id: i64,
    pub parent_id: Option<i64>,
    pub size: i64,
    pub mime_type: String,
    pub storage_key: String,
    pub bucket: String,
    pub checksum: String,
}

/// File metadata queries.
pub struct FileRepository;

impl FileRepository {
    /// Insert a file row. A duplicate storage key is a conflict.
    pub async fn create<'e, E: SqliteExecutor<'e>>(
        executor: E,
        file: &NewFileEntry,
    ) -> Result<FileEntry> {
        let sql = format!(
            "INSERT INTO files (name, path, owner_id, parent_id, size, mime_type, storage_key, bucket, checksum)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {FILE_COLUMNS}"
        );
        sqlx::query_as::<_, FileEntry>(&sql)
            .bind(&file.name)
            .bind(&file.path)
            .bind(file.owner_id)
            .bind(file.parent_id)
            .bind(file.size)
            .bind(&file.mime_type)
            .bind(&file.storage_key)
            .bind(&file.bucket)
            .bind(&file.checksum)
            .fetch_one(executor)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    VaultError::Conflict("storage key already in use".to_string())
                }
                other => other.into(),
            })
    }

    /// Get a file by ID.
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<FileEntry>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        let file = sqlx::query_as::<_, FileEntry>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(file)
    }

    /// Files directly under `parent_id` (`None` for root) owned by
    /// `owner_id`, sorted by name.
    pub async fn list_children<'e, E: SqliteExecutor<'e>>(
        executor: E,
        owner_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<FileEntry>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND parent_id IS ? ORDER BY name ASC, id ASC"
        );
        let files = sqlx::query_as::<_, FileEntry>(&sql)
            .bind(owner_id)
            .bind(parent_id)
            .fetch_all(executor)
            .await?;
        Ok(files)
    }

    /// Files directly under `parent_id`, regardless of owner.
    pub async fn list_by_parent<'e, E: SqliteExecutor<'e>>(
        executor: E,
        parent_id: i64,
    ) -> Result<Vec<FileEntry>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE parent_id = ? ORDER BY id");
        let files = sqlx::query_as::<_, FileEntry>(&sql)
            .bind(parent_id)
            .fetch_all(executor)
            .await?;
        Ok(files)
    }

    /// Set name, path and parent in one statement.
    pub async fn update_location<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        name: &str,
        path: &str,
        parent_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET name = ?, path = ?, parent_id = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(name)
        .bind(path)
        .bind(parent_id)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rewrite the materialized path only.
    pub async fn update_path<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        path: &str,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE files SET path = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(path)
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a file row.
    pub async fn delete<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
