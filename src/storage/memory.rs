//! In-memory object store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{validate_key, ObjectStore};
use crate::{Result, VaultError};

/// Object store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|m| m.get(key).map(|(ct, _)| ct.clone()))
    }
}

fn poisoned() -> VaultError {
    VaultError::Dependency("memory store lock poisoned".to_string())
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()> {
        validate_key(key)?;
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), (content_type.to_string(), content.to_vec()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| VaultError::NotFound("object".to_string()))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self
            .objects
            .write()
            .map_err(|_| poisoned())?
            .remove(key)
            .is_some())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .contains_key(key))
    }
}
