//! Directory hierarchy for sharevault.
//!
//! Every directory and file carries a materialized `path` that must equal
//! its parent's path plus `/` plus its own name. [`DirectoryTree`] keeps
//! that invariant across create, rename, move and delete:
//!
//! - names are sanitized before anything is written
//! - moves are rejected when they would create a cycle
//! - renames and moves cascade the new path prefix to every descendant
//! - structural mutations for one owner are serialized and run to
//!   completion on a detached task inside one transaction

mod directory;
mod file;
mod file_ops;
mod lock;
mod service;
mod walk;

pub use directory::{Directory, DirectoryRepository, NewDirectory};
pub use file::{FileEntry, FileRepository, NewFileEntry};
pub use file_ops::{DownloadResult, UploadRequest};
pub use lock::OwnerLocks;
pub use service::DirectoryTree;
pub use walk::{ancestry, Ancestry};

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::Result;

/// Kind of node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Directory,
    File,
}

/// A descendant the cascade could not update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub kind: NodeKind,
    pub id: i64,
    pub reason: String,
}

/// Outcome of a path cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Descendants whose path was rewritten.
    pub updated: usize,
    /// Descendants left stale.
    pub skipped: Vec<SkippedNode>,
}

impl CascadeReport {
    /// Whether any descendant was skipped.
    pub fn has_warnings(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Result of a rename or move: the updated node plus its cascade report.
#[derive(Debug, Clone, Serialize)]
pub struct Mutation<T> {
    pub node: T,
    pub cascade: CascadeReport,
}

impl<T> Mutation<T> {
    fn unchanged(node: T) -> Self {
        Self {
            node,
            cascade: CascadeReport::default(),
        }
    }

    /// Whether the caller should surface a partial-cascade warning.
    pub fn has_warnings(&self) -> bool {
        self.cascade.has_warnings()
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub directories_deleted: usize,
    pub files_deleted: usize,
    /// File IDs whose stored object could not be removed. Their metadata is
    /// gone either way.
    pub storage_failures: Vec<i64>,
}

/// One step of a root-to-leaf trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub id: i64,
    pub name: String,
    pub path: String,
}

impl From<&Directory> for Breadcrumb {
    fn from(directory: &Directory) -> Self {
        Self {
            id: directory.id,
            name: directory.name.clone(),
            path: directory.path.clone(),
        }
    }
}

/// Contents of one directory (or the owner's root when `directory` is
/// `None`), children sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub directory: Option<Directory>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub directories: Vec<Directory>,
    pub files: Vec<FileEntry>,
}

/// Number of directory levels in a materialized path (`/` is 0).
pub(crate) fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// Whether `name` is already used by a directory or file under `parent_id`.
///
/// Directories and files share one namespace. Comparison is case-sensitive.
/// `exclude_directory`/`exclude_file` skip the node being renamed or moved.
pub(crate) async fn sibling_name_taken(
    conn: &mut SqliteConnection,
    owner_id: i64,
    parent_id: Option<i64>,
    name: &str,
    exclude_directory: Option<i64>,
    exclude_file: Option<i64>,
) -> Result<bool> {
    let taken: i64 = sqlx::query_scalar(
        "SELECT EXISTS(
                    SELECT 1 FROM directories
                    WHERE owner_id = ?1 AND parent_id IS ?2 AND name = ?3 AND id IS NOT ?4)
             OR EXISTS(
                    SELECT 1 FROM files
                    WHERE owner_id = ?1 AND parent_id IS ?2 AND name = ?3 AND id IS NOT ?5)",
    )
    .bind(owner_id)
    .bind(parent_id)
    .bind(name)
    .bind(exclude_directory)
    .bind(exclude_file)
    .fetch_one(&mut *conn)
    .await?;
    Ok(taken != 0)
}
