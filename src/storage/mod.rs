//! Object storage for sharevault.
//!
//! File content lives behind the [`ObjectStore`] contract; metadata lives in
//! the database. Two implementations are provided:
//! - [`LocalObjectStore`]: sharded directories on the local filesystem
//! - [`MemoryObjectStore`]: a process-local map, for tests and ephemeral use

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::{Result, VaultError};

/// Maximum storage key length.
const MAX_KEY_LENGTH: usize = 128;

/// Maximum extension length carried into a storage key.
const MAX_KEY_EXTENSION: usize = 10;

/// Contract for the object storage backend.
pub trait ObjectStore: Send + Sync {
    /// Store `content` under `key`, replacing any existing object.
    fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()>;

    /// Load the object stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the object; `Ok(false)` if it did not exist.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Check whether an object exists.
    fn exists(&self, key: &str) -> Result<bool>;
}

/// Run a store operation on tokio's blocking pool.
///
/// Backends do synchronous I/O, so async callers go through here rather
/// than calling the trait directly.
pub async fn blocking_call<T, F>(store: &Arc<dyn ObjectStore>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn ObjectStore) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| VaultError::Internal(format!("storage task failed: {e}")))?
}

/// Generate a fresh, unguessable storage key.
///
/// The key is a UUIDv4 followed by the original extension when it is short
/// and alphanumeric, e.g. `6f1c...e2.pdf`.
pub fn generate_key(original_name: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|e| e.len() <= MAX_KEY_EXTENSION && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ext) => format!("{uuid}.{ext}"),
        None => uuid,
    }
}

/// Reject keys that could address anything outside the store.
pub fn validate_key(key: &str) -> Result<()> {
    let well_formed = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');

    if well_formed {
        Ok(())
    } else {
        Err(VaultError::Validation("invalid storage key".to_string()))
    }
}
