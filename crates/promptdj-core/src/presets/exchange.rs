//! Preset file import and export
//!
//! Exported files look like:
//!
//! ```json
//! { "name": "Late Night", "prompts": [ { "promptId": "prompt-0", "text": "Bossa Nova",
//!   "weight": 0.0, "cc": 0, "color": "#9900ff" }, ... ] }
//! ```
//!
//! Import also accepts a bare array of entries (older exports). Decoding is
//! strict: every entry must carry all five fields with non-null values of
//! the right type, otherwise the whole file is rejected.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::channels::Channel;

/// Errors decoding an imported preset file
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Expected a preset object or an array of prompts")]
    UnexpectedShape,

    #[error("Preset file contains no prompts")]
    Empty,

    #[error("Prompt {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// A decoded import file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSet {
    /// Name from the document, `None` for bare arrays or missing names
    pub name: Option<String>,
    pub prompts: Vec<Channel>,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    name: &'a str,
    prompts: &'a [Channel],
}

/// Render channels as a pretty-printed export document
pub fn export_json(name: &str, channels: &[Channel]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExportDocument {
        name,
        prompts: channels,
    })
}

/// Strictly decode an import file
pub fn parse_import(json: &str) -> Result<ImportedSet, ImportError> {
    let (name, entries) = match serde_json::from_str::<Value>(json)? {
        Value::Array(entries) => (None, entries),
        Value::Object(mut document) => {
            let name = match document.remove("name") {
                Some(Value::String(name)) if !name.trim().is_empty() => Some(name),
                _ => None,
            };
            match document.remove("prompts") {
                Some(Value::Array(entries)) => (name, entries),
                _ => return Err(ImportError::UnexpectedShape),
            }
        }
        _ => return Err(ImportError::UnexpectedShape),
    };

    if entries.is_empty() {
        return Err(ImportError::Empty);
    }

    let prompts = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| decode_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ImportedSet { name, prompts })
}

fn decode_entry(index: usize, entry: &Value) -> Result<Channel, ImportError> {
    let invalid = |reason: String| ImportError::InvalidEntry { index, reason };

    let fields = entry
        .as_object()
        .ok_or_else(|| invalid("expected an object".to_string()))?;

    let id = string_field(fields, "promptId").map_err(invalid)?;
    let text = string_field(fields, "text").map_err(invalid)?;
    let color = string_field(fields, "color").map_err(invalid)?;

    let weight = required(fields, "weight")
        .map_err(invalid)?
        .as_f64()
        .filter(|w| w.is_finite())
        .ok_or_else(|| invalid("\"weight\" must be a number".to_string()))?;

    let cc = required(fields, "cc")
        .map_err(invalid)?
        .as_u64()
        .filter(|&cc| cc <= 127)
        .ok_or_else(|| invalid("\"cc\" must be an integer between 0 and 127".to_string()))?;

    if text.trim().is_empty() {
        return Err(invalid("\"text\" cannot be empty".to_string()));
    }

    Ok(Channel {
        id,
        text,
        weight: weight as f32,
        cc: cc as u8,
        color,
    })
}

fn required<'a>(fields: &'a Map<String, Value>, key: &str) -> Result<&'a Value, String> {
    match fields.get(key) {
        None => Err(format!("missing \"{}\"", key)),
        Some(Value::Null) => Err(format!("\"{}\" is null", key)),
        Some(value) => Ok(value),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<String, String> {
    required(fields, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("\"{}\" must be a string", key))
}
