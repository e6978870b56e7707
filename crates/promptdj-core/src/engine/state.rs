//! Playback state

/// Where the engine is in its lifecycle
///
/// `Stopped → Loading → Playing`, `Playing/Loading ↔ Paused`, and any state
/// falls back to `Stopped` on error or manual stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    /// Filling the lookahead buffer
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Audio chunks are accepted in this state
    pub fn accepts_audio(self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

/// Why playback stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user stopped playback
    Manual,
    /// The session failed or closed
    Error,
}
