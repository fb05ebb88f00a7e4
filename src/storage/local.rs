//! Local filesystem object store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{validate_key, ObjectStore};
use crate::{Result, VaultError};

/// Object store backed by a sharded directory tree:
///
/// ```text
/// {root}/
/// ├── ab/
/// │   └── ab12cd34...90ab.txt
/// └── cd/
///     └── cd90ab12...7890
/// ```
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for a key: `{root}/{first two chars}/{key}`.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        let shard = if key.len() >= 2 { &key[..2] } else { key };
        Ok(self.root.join(shard).join(key))
    }

    /// Remove shard directories left empty by deletes.
    pub fn cleanup_empty_shards(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let is_empty = fs::read_dir(&path)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
                if is_empty && fs::remove_dir(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn backend_error(op: &str, e: io::Error) -> VaultError {
    VaultError::Dependency(format!("{op} failed: {e}"))
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, content: &[u8], _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| backend_error("put", e))?;
        }
        fs::write(&path, content).map_err(|e| backend_error("put", e))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VaultError::NotFound("object".to_string()))
            }
            Err(e) => Err(backend_error("get", e)),
        }
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(backend_error("delete", e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key)?.is_file())
    }
}
