//! Events published by the playback engine

use super::{PlaybackState, StopReason};
use crate::session::WeightedPrompt;

/// What the engine tells the rest of the surface
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlaybackState),
    /// Playback reached `Stopped`
    Stopped { reason: StopReason },
    /// The active list was sent to the session
    PromptsPushed(Vec<WeightedPrompt>),
    /// The session refused a prompt
    PromptFiltered { text: String, reason: String },
}
