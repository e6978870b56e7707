//! Channel state: the sixteen prompt channels and their commands
//!
//! [`ChannelStore`] is the single authority over channel state. Input
//! sources send [`ChannelCommand`]s; the store validates them, persists the
//! result, refreshes the shared [`BindingTable`] and publishes a
//! [`MixUpdate`] for the playback engine.

mod bindings;
mod channel;
mod store;

pub use bindings::BindingTable;
pub use channel::{
    arrange, channel_id, channel_index, clamp_weight, default_channels, Channel, ControlStyle,
    DEFAULT_PROMPTS, MAX_WEIGHT, MIN_WEIGHT,
};
pub use store::ChannelStore;

use thiserror::Error;

/// A mutation of one channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCommand {
    /// Set an absolute weight (clamped to `[0, 2]`)
    SetWeight { id: String, weight: f32 },
    /// Add `delta` to the current weight (clamped to `[0, 2]`)
    NudgeWeight { id: String, delta: f32 },
    /// Bind a MIDI CC number
    SetControl { id: String, cc: u8 },
    SetText { id: String, text: String },
    SetColor { id: String, color: String },
}

impl ChannelCommand {
    /// Target channel id
    pub fn id(&self) -> &str {
        match self {
            ChannelCommand::SetWeight { id, .. }
            | ChannelCommand::NudgeWeight { id, .. }
            | ChannelCommand::SetControl { id, .. }
            | ChannelCommand::SetText { id, .. }
            | ChannelCommand::SetColor { id, .. } => id,
        }
    }
}

/// Snapshot published to the engine after every mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MixUpdate {
    pub prompts: Vec<Channel>,
    /// Forget prompts the session filtered (bulk replacement)
    pub clear_filtered: bool,
}

/// Rejected channel commands
#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Invalid weight for {id}: {value}")]
    InvalidWeight { id: String, value: f32 },

    #[error("Prompt text for {0} cannot be empty")]
    EmptyText(String),

    #[error("CC number out of range: {0}")]
    InvalidControl(u8),
}
