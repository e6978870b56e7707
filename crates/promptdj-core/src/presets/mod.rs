//! Named presets, favorites, dirty tracking and file exchange

mod exchange;
mod manager;

pub use exchange::{export_json, parse_import, ImportError, ImportedSet};
pub use manager::{Preset, PresetManager, WEIGHT_EPSILON};

use thiserror::Error;

/// Errors from preset operations
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Preset name cannot be empty")]
    EmptyName,

    #[error("A preset named \"{0}\" already exists")]
    DuplicateName(String),

    #[error("No preset named \"{0}\"")]
    NotFound(String),

    #[error("No preset is loaded")]
    NoActivePreset,

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Failed to serialize preset: {0}")]
    Serialize(#[from] serde_json::Error),
}
