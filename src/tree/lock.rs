//! Per-owner serialization of structural mutations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per owner.
///
/// Create, rename, move and delete for a given owner run one at a time so
/// two cascades can never interleave on a shared subtree. Reads never take
/// these locks.
#[derive(Clone)]
pub struct OwnerLocks {
    locks: Arc<RwLock<HashMap<i64, Arc<Mutex<()>>>>>,
    prune_above: usize,
}

/// Table size past which [`OwnerLocks::prune`] drops idle entries.
const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

impl Default for OwnerLocks {
    fn default() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }
}

impl OwnerLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty lock table that prunes once it holds more than
    /// `prune_above` owners.
    pub fn with_prune_threshold(prune_above: usize) -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
            prune_above,
        }
    }

    /// Get or create the mutex for `owner_id`.
    fn get_or_create(&self, owner_id: i64) -> Arc<Mutex<()>> {
        {
            let read_guard = self.locks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(lock) = read_guard.get(&owner_id) {
                return lock.clone();
            }
        }

        let mut write_guard = self.locks.write().unwrap_or_else(PoisonError::into_inner);

        // Double-check after acquiring write lock
        write_guard
            .entry(owner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive structural access to `owner_id`'s tree.
    ///
    /// The guard is owned so it can travel into a spawned task.
    pub async fn acquire(&self, owner_id: i64) -> OwnedMutexGuard<()> {
        self.get_or_create(owner_id).lock_owned().await
    }

    /// Drop entries nobody is holding or waiting on.
    pub fn cleanup(&self) -> usize {
        let mut guard = self.locks.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - guard.len()
    }

    /// Run [`cleanup`](Self::cleanup) if the table has grown past its
    /// threshold. Called after every structural mutation.
    pub fn prune(&self) -> usize {
        if self.len() > self.prune_above {
            self.cleanup()
        } else {
            0
        }
    }

    /// Number of owners with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
