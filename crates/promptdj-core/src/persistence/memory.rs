//! In-memory storage

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Storage, StorageError};

/// Storage backed by a shared map
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the store or preset manager wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(key).cloned()))
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), blob.to_string());
        }
        Ok(())
    }
}
