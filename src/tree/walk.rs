//! Bounded walks over possibly-corrupted tree data.
//!
//! Both walks keep a visited set as well as a hop limit: the limit bounds
//! pathological input, the visited set detects cycles.

use std::collections::HashSet;

use sqlx::SqliteConnection;
use tracing::warn;

use super::{Directory, DirectoryRepository, FileEntry, FileRepository, NodeKind, SkippedNode};
use crate::Result;

/// Where a directory sits relative to a candidate ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestry {
    /// The ancestor is on the parent chain (or is the start itself).
    Inside,
    /// The chain reached the root without meeting the ancestor.
    Outside,
    /// The chain is broken, cyclic or deeper than the guard.
    Undetermined,
}

/// Walk the parent chain from `start` looking for `ancestor_id`.
///
/// At most `max_depth` rows are read.
pub async fn ancestry(
    conn: &mut SqliteConnection,
    start: i64,
    ancestor_id: i64,
    max_depth: usize,
) -> Result<Ancestry> {
    let mut visited = HashSet::new();
    let mut current = Some(start);
    let mut hops = 0;

    while let Some(id) = current {
        if id == ancestor_id {
            return Ok(Ancestry::Inside);
        }
        if !visited.insert(id) {
            warn!(directory_id = id, "Cycle detected in parent chain");
            return Ok(Ancestry::Undetermined);
        }
        if hops >= max_depth {
            warn!(start, max_depth, "Parent chain exceeds depth guard");
            return Ok(Ancestry::Undetermined);
        }
        hops += 1;

        current = match DirectoryRepository::get_by_id(&mut *conn, id).await? {
            Some(directory) => directory.parent_id,
            None => {
                warn!(directory_id = id, "Parent chain references a missing directory");
                return Ok(Ancestry::Undetermined);
            }
        };
    }

    Ok(Ancestry::Outside)
}

/// A descendant directory with its depth below the walk root (children are 1).
#[derive(Debug, Clone)]
pub(crate) struct WalkedDirectory {
    pub directory: Directory,
    pub depth: usize,
}

/// Everything below a directory, discovered depth-first.
#[derive(Debug, Default)]
pub(crate) struct SubtreeWalk {
    /// Descendant directories; every parent precedes its children.
    pub directories: Vec<WalkedDirectory>,
    /// Descendant files.
    pub files: Vec<FileEntry>,
    /// Parts of the subtree that could not be enumerated.
    pub skipped: Vec<SkippedNode>,
}

impl SubtreeWalk {
    /// Deepest descendant directory level.
    pub fn max_depth(&self) -> usize {
        self.directories.iter().map(|d| d.depth).max().unwrap_or(0)
    }
}

/// Enumerate the subtree under `root`, visiting every node at most once.
///
/// Listing failures are logged and recorded in `skipped`; the walk keeps
/// going with the rest of the tree.
pub(crate) async fn walk_subtree(
    conn: &mut SqliteConnection,
    root: &Directory,
    max_depth: usize,
) -> SubtreeWalk {
    let mut walk = SubtreeWalk::default();
    let mut visited = HashSet::from([root.id]);
    let mut stack = vec![(root.id, 0usize)];

    while let Some((directory_id, depth)) = stack.pop() {
        match FileRepository::list_by_parent(&mut *conn, directory_id).await {
            Ok(files) => walk.files.extend(files),
            Err(e) => {
                warn!(directory_id, error = %e, "Could not list files during walk");
                walk.skipped.push(SkippedNode {
                    kind: NodeKind::Directory,
                    id: directory_id,
                    reason: format!("could not list files: {e}"),
                });
            }
        }

        let children = match DirectoryRepository::list_by_parent(&mut *conn, directory_id).await
        {
            Ok(children) => children,
            Err(e) => {
                warn!(directory_id, error = %e, "Could not list subdirectories during walk");
                walk.skipped.push(SkippedNode {
                    kind: NodeKind::Directory,
                    id: directory_id,
                    reason: format!("could not list subdirectories: {e}"),
                });
                continue;
            }
        };

        if children.is_empty() {
            continue;
        }
        if depth + 1 > max_depth {
            warn!(directory_id, max_depth, "Depth guard reached during walk");
            walk.skipped.push(SkippedNode {
                kind: NodeKind::Directory,
                id: directory_id,
                reason: "depth guard reached".to_string(),
            });
            continue;
        }

        for child in children {
            if !visited.insert(child.id) {
                warn!(directory_id = child.id, "Directory reached twice during walk");
                walk.skipped.push(SkippedNode {
                    kind: NodeKind::Directory,
                    id: child.id,
                    reason: "cycle detected".to_string(),
                });
                continue;
            }
            stack.push((child.id, depth + 1));
            walk.directories.push(WalkedDirectory {
                directory: child,
                depth: depth + 1,
            });
        }
    }

    walk
}
