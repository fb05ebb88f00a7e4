//! File operations on the tree: upload, download, rename, move and delete.

use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::service::{check_path_length, name_conflict, owned_directory};
use super::{sibling_name_taken, DeleteReport, DirectoryTree, FileEntry, FileRepository, NewFileEntry};
use crate::sanitize::{
    detect_mime_type, join_path, mime_allowed, sanitize_filename, validate_file_size,
    SanitizeError,
};
use crate::storage::{blocking_call, generate_key};
use crate::{Result, VaultError};

/// Extra attempts for a failed object read. Reads are idempotent; writes
/// are never retried.
const READ_RETRIES: u32 = 2;

/// Delay before the first read retry; doubled for each further attempt.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// An upload into the tree.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-supplied filename; sanitized before use.
    pub name: String,
    /// File content.
    pub content: Vec<u8>,
    /// Client-declared MIME type. Guessed from the name when absent.
    pub content_type: Option<String>,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A file and its content.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub file: FileEntry,
    #[serde(skip_serializing)]
    pub content: Vec<u8>,
}

impl DirectoryTree {
    /// Store a new file under `parent_id` (`None` for the root).
    ///
    /// The object is written first and the metadata second; if the
    /// metadata insert fails the object is removed again.
    pub async fn upload_file(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        request: UploadRequest,
    ) -> Result<FileEntry> {
        let name = sanitize_filename(&request.name)?;
        validate_file_size(Some(request.content.len() as i64), self.max_file_size)?;

        let mime_type = request
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| detect_mime_type(&name));
        if !mime_allowed(&mime_type, &self.allowed_mime_types) {
            return Err(SanitizeError::MimeNotAllowed.into());
        }

        let content = request.content;
        self.run_detached(owner_id, move |tree| async move {
            tree.upload_file_locked(owner_id, parent_id, name, mime_type, content)
                .await
        })
        .await
    }

    async fn upload_file_locked(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: String,
        mime_type: String,
        content: Vec<u8>,
    ) -> Result<FileEntry> {
        let mut tx = self.db.begin_write().await?;

        let parent_path = match parent_id {
            Some(id) => Some(owned_directory(&mut *tx, owner_id, id).await?.path),
            None => None,
        };
        let path = join_path(parent_path.as_deref(), &name);
        check_path_length(&path)?;

        if sibling_name_taken(&mut tx, owner_id, parent_id, &name, None, None).await? {
            return Err(name_conflict(&name));
        }

        let storage_key = generate_key(&name);
        let checksum = format!("{:x}", Sha256::digest(&content));
        let size = content.len() as i64;
        {
            let key = storage_key.clone();
            let content_type = mime_type.clone();
            blocking_call(&self.store, move |store| store.put(&key, &content, &content_type))
                .await?;
        }

        let new_file = NewFileEntry {
            name,
            path,
            owner_id,
            parent_id,
            size,
            mime_type,
            storage_key: storage_key.clone(),
            bucket: self.bucket.clone(),
            checksum,
        };

        let created = FileRepository::create(&mut *tx, &new_file).await;
        let inserted = match created {
            Ok(file) => tx.commit().await.map(|_| file).map_err(VaultError::from),
            Err(e) => Err(e),
        };

        match inserted {
            Ok(file) => {
                info!(
                    owner_id,
                    file_id = file.id,
                    path = %file.path,
                    size = file.size,
                    "Uploaded file"
                );
                Ok(file)
            }
            Err(e) => {
                let key = storage_key.clone();
                let cleanup = blocking_call(&self.store, move |store| store.delete(&key)).await;
                if let Err(cleanup) = cleanup {
                    warn!(error = %cleanup, "Failed to remove orphaned object");
                }
                Err(e)
            }
        }
    }

    /// Get file metadata owned by `owner_id`.
    pub async fn get_file(&self, owner_id: i64, file_id: i64) -> Result<FileEntry> {
        owned_file(self, owner_id, file_id).await
    }

    /// Get a file owned by `owner_id` together with its content.
    pub async fn read_file(&self, owner_id: i64, file_id: i64) -> Result<DownloadResult> {
        let file = owned_file(self, owner_id, file_id).await?;
        let content = self.read_content(&file).await?;
        Ok(DownloadResult { file, content })
    }

    /// Load the stored object for `file`, retrying backend failures.
    pub async fn read_content(&self, file: &FileEntry) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            let key = file.storage_key.clone();
            match blocking_call(&self.store, move |store| store.get(&key)).await {
                Ok(content) => {
                    debug!(file_id = file.id, bytes = content.len(), "Read file content");
                    return Ok(content);
                }
                Err(VaultError::Dependency(e)) if attempt < READ_RETRIES => {
                    let delay = READ_RETRY_BACKOFF * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(file_id = file.id, attempt, error = %e, "Retrying object read");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rename a file in place.
    pub async fn rename_file(
        &self,
        owner_id: i64,
        file_id: i64,
        new_name: &str,
    ) -> Result<FileEntry> {
        let name = sanitize_filename(new_name)?;
        self.run_detached(owner_id, move |tree| async move {
            tree.relocate_file_locked(owner_id, file_id, Some(name), None)
                .await
        })
        .await
    }

    /// Move a file under `target_parent_id` (`None` for the root).
    pub async fn move_file(
        &self,
        owner_id: i64,
        file_id: i64,
        target_parent_id: Option<i64>,
    ) -> Result<FileEntry> {
        self.run_detached(owner_id, move |tree| async move {
            tree.relocate_file_locked(owner_id, file_id, None, Some(target_parent_id))
                .await
        })
        .await
    }

    /// Shared body of rename and move. `None` keeps the current value.
    async fn relocate_file_locked(
        &self,
        owner_id: i64,
        file_id: i64,
        new_name: Option<String>,
        new_parent: Option<Option<i64>>,
    ) -> Result<FileEntry> {
        let mut tx = self.db.begin_write().await?;
        let file = FileRepository::get_by_id(&mut *tx, file_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))?;
        if file.owner_id != owner_id {
            return Err(VaultError::Permission("file belongs to another user".to_string()));
        }

        let name = new_name.unwrap_or_else(|| file.name.clone());
        let parent_id = new_parent.unwrap_or(file.parent_id);
        if name == file.name && parent_id == file.parent_id {
            return Ok(file);
        }

        let parent_path = match parent_id {
            Some(id) => Some(owned_directory(&mut *tx, owner_id, id).await?.path),
            None => None,
        };
        let path = join_path(parent_path.as_deref(), &name);
        check_path_length(&path)?;

        if sibling_name_taken(&mut tx, owner_id, parent_id, &name, None, Some(file.id)).await? {
            return Err(name_conflict(&name));
        }

        FileRepository::update_location(&mut *tx, file.id, &name, &path, parent_id).await?;
        let updated = FileRepository::get_by_id(&mut *tx, file.id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))?;
        tx.commit().await?;

        info!(owner_id, file_id, from = %file.path, to = %updated.path, "Relocated file");
        Ok(updated)
    }

    /// Delete a file's metadata, then its stored object (best effort).
    pub async fn delete_file(&self, owner_id: i64, file_id: i64) -> Result<DeleteReport> {
        self.run_detached(owner_id, move |tree| async move {
            tree.delete_file_locked(owner_id, file_id).await
        })
        .await
    }

    async fn delete_file_locked(&self, owner_id: i64, file_id: i64) -> Result<DeleteReport> {
        let file = owned_file(self, owner_id, file_id).await?;
        FileRepository::delete(self.db.pool(), file.id).await?;

        let mut report = DeleteReport {
            files_deleted: 1,
            ..Default::default()
        };
        let key = file.storage_key.clone();
        if let Err(e) = blocking_call(&self.store, move |store| store.delete(&key)).await {
            warn!(file_id, error = %e, "Failed to delete stored object");
            report.storage_failures.push(file.id);
        }

        info!(owner_id, file_id, path = %file.path, "Deleted file");
        Ok(report)
    }
}

async fn owned_file(tree: &DirectoryTree, owner_id: i64, file_id: i64) -> Result<FileEntry> {
    let file = FileRepository::get_by_id(tree.db.pool(), file_id)
        .await?
        .ok_or_else(|| VaultError::NotFound("file".to_string()))?;
    if file.owner_id != owner_id {
        return Err(VaultError::Permission("file belongs to another user".to_string()));
    }
    Ok(file)
}
