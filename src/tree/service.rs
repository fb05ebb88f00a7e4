//! Directory operations.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use sqlx::{SqliteConnection, SqliteExecutor};
use tracing::{debug, info, warn};

use super::walk::{ancestry, walk_subtree, Ancestry};
use super::{
    path_depth, sibling_name_taken, Breadcrumb, CascadeReport, DeleteReport, Directory,
    DirectoryRepository, FileRepository, Listing, Mutation, NewDirectory, NodeKind, OwnerLocks,
    SkippedNode,
};
use crate::config::Config;
use crate::db::Database;
use crate::sanitize::{join_path, sanitize_filename, SanitizeError, MAX_PATH_BYTES};
use crate::storage::{blocking_call, ObjectStore};
use crate::{Result, VaultError};

/// Maintains the directory/file hierarchy for every owner.
///
/// Cloning is cheap; clones share the pool, the object store and the lock
/// table.
#[derive(Clone)]
pub struct DirectoryTree {
    pub(super) db: Database,
    pub(super) store: Arc<dyn ObjectStore>,
    locks: OwnerLocks,
    pub(super) max_depth: usize,
    pub(super) max_file_size: i64,
    pub(super) allowed_mime_types: Arc<Vec<String>>,
    pub(super) bucket: String,
}

impl DirectoryTree {
    /// Create a tree with default limits.
    pub fn new(db: Database, store: Arc<dyn ObjectStore>) -> Self {
        Self::from_config(db, store, &Config::default())
    }

    /// Create a tree using the `[tree]`, `[uploads]` and `[storage]` settings.
    pub fn from_config(db: Database, store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            db,
            store,
            locks: OwnerLocks::new(),
            max_depth: config.tree.max_depth,
            max_file_size: config.uploads.max_file_size_bytes(),
            allowed_mime_types: Arc::new(config.uploads.allowed_mime_types.clone()),
            bucket: config.storage.bucket.clone(),
        }
    }

    /// Override the nesting limit and walk guard.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Override the upload size limit and MIME allow-list.
    pub fn with_upload_policy(mut self, max_file_size: i64, allowed: Vec<String>) -> Self {
        self.max_file_size = max_file_size;
        self.allowed_mime_types = Arc::new(allowed);
        self
    }

    /// Database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Nesting limit and walk guard.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Run a structural mutation for `owner_id`.
    ///
    /// The owner's lock is held for the whole operation, and the work runs
    /// on its own task so it finishes even if the caller goes away.
    pub(super) async fn run_detached<T, F, Fut>(&self, owner_id: i64, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(DirectoryTree) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let guard = self.locks.acquire(owner_id).await;
        let locks = self.locks.clone();
        let tree = self.clone();
        let handle = tokio::spawn(async move {
            let result = op(tree).await;
            drop(guard);
            locks.prune();
            result
        });
        handle
            .await
            .map_err(|e| VaultError::Internal(format!("structural task failed: {e}")))?
    }

    /// Create a directory under `parent_id` (`None` for the owner's root).
    pub async fn create_directory(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Directory> {
        let name = sanitize_filename(name)?;
        self.run_detached(owner_id, move |tree| async move {
            tree.create_directory_locked(owner_id, parent_id, name).await
        })
        .await
    }

    async fn create_directory_locked(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: String,
    ) -> Result<Directory> {
        let mut tx = self.db.begin_write().await?;

        let parent_path = match parent_id {
            Some(id) => Some(owned_directory(&mut *tx, owner_id, id).await?.path),
            None => None,
        };
        let path = join_path(parent_path.as_deref(), &name);
        check_path_length(&path)?;
        self.check_depth(path_depth(&path))?;

        if sibling_name_taken(&mut tx, owner_id, parent_id, &name, None, None).await? {
            return Err(name_conflict(&name));
        }

        let directory = DirectoryRepository::create(
            &mut *tx,
            &NewDirectory {
                name,
                path,
                owner_id,
                parent_id,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            owner_id,
            directory_id = directory.id,
            path = %directory.path,
            "Created directory"
        );
        Ok(directory)
    }

    /// Rename a directory and rewrite the paths of everything below it.
    pub async fn rename_directory(
        &self,
        owner_id: i64,
        directory_id: i64,
        new_name: &str,
    ) -> Result<Mutation<Directory>> {
        let name = sanitize_filename(new_name)?;
        self.run_detached(owner_id, move |tree| async move {
            tree.rename_directory_locked(owner_id, directory_id, name)
                .await
        })
        .await
    }

    async fn rename_directory_locked(
        &self,
        owner_id: i64,
        directory_id: i64,
        name: String,
    ) -> Result<Mutation<Directory>> {
        let mut tx = self.db.begin_write().await?;
        let directory = owned_directory(&mut *tx, owner_id, directory_id).await?;
        if directory.name == name {
            return Ok(Mutation::unchanged(directory));
        }

        if sibling_name_taken(
            &mut tx,
            owner_id,
            directory.parent_id,
            &name,
            Some(directory.id),
            None,
        )
        .await?
        {
            return Err(name_conflict(&name));
        }

        let parent_path = match directory.parent_id {
            Some(parent_id) => Some(
                DirectoryRepository::get_by_id(&mut *tx, parent_id)
                    .await?
                    .ok_or_else(|| VaultError::NotFound("parent directory".to_string()))?
                    .path,
            ),
            None => None,
        };
        let new_path = join_path(parent_path.as_deref(), &name);
        let old_path = directory.path.clone();

        let mutation = self
            .relocate(&mut tx, &directory, &name, directory.parent_id, new_path)
            .await?;
        tx.commit().await?;

        info!(
            owner_id,
            directory_id,
            from = %old_path,
            to = %mutation.node.path,
            updated = mutation.cascade.updated,
            skipped = mutation.cascade.skipped.len(),
            "Renamed directory"
        );
        Ok(mutation)
    }

    /// Move a directory under `target_parent_id` (`None` for the root).
    ///
    /// Moving a directory into itself or into its own subtree is a conflict.
    pub async fn move_directory(
        &self,
        owner_id: i64,
        directory_id: i64,
        target_parent_id: Option<i64>,
    ) -> Result<Mutation<Directory>> {
        self.run_detached(owner_id, move |tree| async move {
            tree.move_directory_locked(owner_id, directory_id, target_parent_id)
                .await
        })
        .await
    }

    async fn move_directory_locked(
        &self,
        owner_id: i64,
        directory_id: i64,
        target_parent_id: Option<i64>,
    ) -> Result<Mutation<Directory>> {
        if target_parent_id == Some(directory_id) {
            return Err(VaultError::Conflict(
                "a directory cannot be moved into itself".to_string(),
            ));
        }

        let mut tx = self.db.begin_write().await?;
        let directory = owned_directory(&mut *tx, owner_id, directory_id).await?;
        if directory.parent_id == target_parent_id {
            return Ok(Mutation::unchanged(directory));
        }

        let target_path = match target_parent_id {
            Some(target_id) => {
                let target = owned_directory(&mut *tx, owner_id, target_id).await?;
                match ancestry(&mut tx, target.id, directory.id, self.max_depth).await? {
                    Ancestry::Outside => {}
                    Ancestry::Inside => {
                        return Err(VaultError::Conflict(
                            "a directory cannot be moved into its own subtree".to_string(),
                        ))
                    }
                    Ancestry::Undetermined => {
                        return Err(VaultError::Conflict(
                            "destination ancestry could not be verified".to_string(),
                        ))
                    }
                }
                Some(target.path)
            }
            None => None,
        };

        if sibling_name_taken(
            &mut tx,
            owner_id,
            target_parent_id,
            &directory.name,
            Some(directory.id),
            None,
        )
        .await?
        {
            return Err(name_conflict(&directory.name));
        }

        let new_path = join_path(target_path.as_deref(), &directory.name);
        let old_path = directory.path.clone();
        let name = directory.name.clone();

        let mutation = self
            .relocate(&mut tx, &directory, &name, target_parent_id, new_path)
            .await?;
        tx.commit().await?;

        info!(
            owner_id,
            directory_id,
            from = %old_path,
            to = %mutation.node.path,
            updated = mutation.cascade.updated,
            skipped = mutation.cascade.skipped.len(),
            "Moved directory"
        );
        Ok(mutation)
    }

    /// Point `directory` at its new name, parent and path, then cascade the
    /// new prefix to every descendant.
    ///
    /// All new paths are computed and checked before anything is written.
    /// Per-descendant write failures are logged and reported, not fatal.
    async fn relocate(
        &self,
        conn: &mut SqliteConnection,
        directory: &Directory,
        name: &str,
        parent_id: Option<i64>,
        new_path: String,
    ) -> Result<Mutation<Directory>> {
        check_path_length(&new_path)?;
        let base_depth = path_depth(&new_path);

        let walk = walk_subtree(conn, directory, self.max_depth).await;
        self.check_depth(base_depth + walk.max_depth())?;

        let mut new_paths: HashMap<i64, String> = HashMap::new();
        new_paths.insert(directory.id, new_path.clone());

        let mut directory_updates = Vec::with_capacity(walk.directories.len());
        for walked in &walk.directories {
            let child = &walked.directory;
            let Some(parent_path) = child.parent_id.and_then(|id| new_paths.get(&id)) else {
                continue;
            };
            let path = join_path(Some(parent_path.as_str()), &child.name);
            check_path_length(&path)?;
            new_paths.insert(child.id, path.clone());
            directory_updates.push((child.id, path));
        }

        let mut file_updates = Vec::with_capacity(walk.files.len());
        for file in &walk.files {
            let Some(parent_path) = file.parent_id.and_then(|id| new_paths.get(&id)) else {
                continue;
            };
            let path = join_path(Some(parent_path.as_str()), &file.name);
            check_path_length(&path)?;
            file_updates.push((file.id, path));
        }

        if !DirectoryRepository::update_location(&mut *conn, directory.id, name, &new_path, parent_id)
            .await?
        {
            return Err(VaultError::NotFound("directory".to_string()));
        }

        let mut cascade = CascadeReport {
            updated: 0,
            skipped: walk.skipped,
        };
        for (id, path) in directory_updates {
            let result = DirectoryRepository::update_path(&mut *conn, id, &path).await;
            record_update(&mut cascade, NodeKind::Directory, id, result);
        }
        for (id, path) in file_updates {
            let result = FileRepository::update_path(&mut *conn, id, &path).await;
            record_update(&mut cascade, NodeKind::File, id, result);
        }

        let node = DirectoryRepository::get_by_id(&mut *conn, directory.id)
            .await?
            .ok_or_else(|| VaultError::NotFound("directory".to_string()))?;

        Ok(Mutation { node, cascade })
    }

    /// Delete a directory.
    ///
    /// Without `recursive` the directory must be empty. With it, every
    /// descendant file and directory is removed in one transaction; stored
    /// objects are removed afterwards on a best-effort basis.
    pub async fn delete_directory(
        &self,
        owner_id: i64,
        directory_id: i64,
        recursive: bool,
    ) -> Result<DeleteReport> {
        self.run_detached(owner_id, move |tree| async move {
            tree.delete_directory_locked(owner_id, directory_id, recursive)
                .await
        })
        .await
    }

    async fn delete_directory_locked(
        &self,
        owner_id: i64,
        directory_id: i64,
        recursive: bool,
    ) -> Result<DeleteReport> {
        let mut tx = self.db.begin_write().await?;
        let directory = owned_directory(&mut *tx, owner_id, directory_id).await?;

        if !recursive {
            if DirectoryRepository::count_children(&mut *tx, directory.id).await? > 0 {
                return Err(VaultError::Conflict("directory is not empty".to_string()));
            }
            DirectoryRepository::delete(&mut *tx, directory.id).await?;
            tx.commit().await?;
            info!(owner_id, directory_id, path = %directory.path, "Deleted directory");
            return Ok(DeleteReport {
                directories_deleted: 1,
                ..Default::default()
            });
        }

        let walk = walk_subtree(&mut tx, &directory, self.max_depth).await;
        if let Some(skipped) = walk.skipped.first() {
            return Err(VaultError::Conflict(format!(
                "subtree could not be fully enumerated: {}",
                skipped.reason
            )));
        }

        for file in &walk.files {
            FileRepository::delete(&mut *tx, file.id).await?;
        }
        // Children were discovered after their parents.
        for walked in walk.directories.iter().rev() {
            DirectoryRepository::delete(&mut *tx, walked.directory.id).await?;
        }
        DirectoryRepository::delete(&mut *tx, directory.id).await?;
        tx.commit().await?;

        let mut report = DeleteReport {
            directories_deleted: walk.directories.len() + 1,
            files_deleted: walk.files.len(),
            storage_failures: Vec::new(),
        };
        let objects: Vec<(i64, String)> = walk
            .files
            .iter()
            .map(|f| (f.id, f.storage_key.clone()))
            .collect();
        let outcomes = blocking_call(&self.store, move |store| {
            Ok(objects
                .into_iter()
                .map(|(file_id, key)| (file_id, store.delete(&key)))
                .collect::<Vec<_>>())
        })
        .await;
        match outcomes {
            Ok(outcomes) => {
                for (file_id, outcome) in outcomes {
                    match outcome {
                        Ok(true) => {}
                        Ok(false) => debug!(file_id, "Stored object already absent"),
                        Err(e) => {
                            warn!(file_id, error = %e, "Failed to delete stored object");
                            report.storage_failures.push(file_id);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(directory_id, error = %e, "Failed to delete stored objects");
                report
                    .storage_failures
                    .extend(walk.files.iter().map(|f| f.id));
            }
        }

        info!(
            owner_id,
            directory_id,
            path = %directory.path,
            directories = report.directories_deleted,
            files = report.files_deleted,
            "Deleted directory recursively"
        );
        Ok(report)
    }

    /// Root-to-leaf trail ending at `directory_id`.
    ///
    /// A missing, foreign or cyclic ancestor truncates the trail instead of
    /// failing the call.
    pub async fn breadcrumbs(&self, owner_id: i64, directory_id: i64) -> Result<Vec<Breadcrumb>> {
        let mut conn = self.db.pool().acquire().await?;
        let leaf = owned_directory(&mut *conn, owner_id, directory_id).await?;

        let mut trail = vec![Breadcrumb::from(&leaf)];
        let mut visited = HashSet::from([leaf.id]);
        let mut current = leaf.parent_id;

        while let Some(parent_id) = current {
            if trail.len() > self.max_depth {
                warn!(directory_id, "Breadcrumb walk hit the depth guard");
                break;
            }
            if !visited.insert(parent_id) {
                warn!(directory_id, parent_id, "Cycle detected while building breadcrumbs");
                break;
            }
            match DirectoryRepository::get_by_id(&mut *conn, parent_id).await {
                Ok(Some(parent)) if parent.owner_id == owner_id => {
                    current = parent.parent_id;
                    trail.push(Breadcrumb::from(&parent));
                }
                Ok(Some(_)) => {
                    warn!(directory_id, parent_id, "Ancestor belongs to another owner");
                    break;
                }
                Ok(None) => {
                    warn!(directory_id, parent_id, "Ancestor is missing");
                    break;
                }
                Err(e) => {
                    warn!(directory_id, parent_id, error = %e, "Could not read ancestor");
                    break;
                }
            }
        }

        trail.reverse();
        Ok(trail)
    }

    /// List one directory (or the root) with breadcrumbs and sorted children.
    pub async fn list(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Listing> {
        let (directory, directories, files) = {
            let mut conn = self.db.pool().acquire().await?;
            let directory = match parent_id {
                Some(id) => Some(owned_directory(&mut *conn, owner_id, id).await?),
                None => None,
            };
            let directories =
                DirectoryRepository::list_children(&mut *conn, owner_id, parent_id).await?;
            let files = FileRepository::list_children(&mut *conn, owner_id, parent_id).await?;
            (directory, directories, files)
        };

        let breadcrumbs = match parent_id {
            Some(id) => self.breadcrumbs(owner_id, id).await?,
            None => Vec::new(),
        };

        debug!(
            owner_id,
            ?parent_id,
            directories = directories.len(),
            files = files.len(),
            "Listed directory"
        );
        Ok(Listing {
            directory,
            breadcrumbs,
            directories,
            files,
        })
    }

    /// Get a directory owned by `owner_id`.
    pub async fn get(&self, owner_id: i64, directory_id: i64) -> Result<Directory> {
        owned_directory(self.db.pool(), owner_id, directory_id).await
    }

    pub(super) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(VaultError::Validation(format!(
                "directories cannot be nested more than {} levels deep",
                self.max_depth
            )));
        }
        Ok(())
    }
}

/// Load a directory and confirm `owner_id` owns it.
pub(super) async fn owned_directory<'e, E: SqliteExecutor<'e>>(
    executor: E,
    owner_id: i64,
    directory_id: i64,
) -> Result<Directory> {
    let directory = DirectoryRepository::get_by_id(executor, directory_id)
        .await?
        .ok_or_else(|| VaultError::NotFound("directory".to_string()))?;
    if directory.owner_id != owner_id {
        return Err(VaultError::Permission(
            "directory belongs to another user".to_string(),
        ));
    }
    Ok(directory)
}

pub(super) fn check_path_length(path: &str) -> Result<()> {
    if path.len() > MAX_PATH_BYTES {
        return Err(SanitizeError::PathTooLong.into());
    }
    Ok(())
}

pub(super) fn name_conflict(name: &str) -> VaultError {
    VaultError::Conflict(format!("an entry named '{name}' already exists here"))
}

fn record_update(cascade: &mut CascadeReport, kind: NodeKind, id: i64, result: Result<bool>) {
    match result {
        Ok(true) => cascade.updated += 1,
        Ok(false) => {
            warn!(?kind, id, "Descendant vanished during cascade");
            cascade.skipped.push(SkippedNode {
                kind,
                id,
                reason: "row no longer exists".to_string(),
            });
        }
        Err(e) => {
            warn!(?kind, id, error = %e, "Failed to update descendant path");
            cascade.skipped.push(SkippedNode {
                kind,
                id,
                reason: e.to_string(),
            });
        }
    }
}
