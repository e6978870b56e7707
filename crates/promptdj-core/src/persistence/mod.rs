//! Key/value blob persistence
//!
//! The store and preset manager keep their state as JSON blobs under fixed
//! keys. [`FileStorage`] writes one file per key; [`MemoryStorage`] keeps
//! everything in memory for tests and ephemeral sessions.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Key of the live channel snapshot
pub const ACTIVE_PROMPTS_KEY: &str = "promptdj.active-prompts";

/// Key of the preset list
pub const PRESETS_KEY: &str = "promptdj.presets";

/// Errors from the persistence backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// A small key/value blob store
pub trait Storage: Send {
    /// Read the blob stored under `key`, `None` if absent
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the blob stored under `key`
    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn store(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        (**self).store(key, blob)
    }
}
