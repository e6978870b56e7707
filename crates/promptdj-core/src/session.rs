//! Boundary to the generative-music backend
//!
//! The backend connection is opaque: the engine talks to it through the
//! [`Session`] trait and receives pushed [`SessionEvent`]s on a flume
//! channel handed over at connect time. Each connection gets its own
//! channel, so events from a dropped connection can never reach the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A prompt as sent to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f32,
}

/// One base64 PCM payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioChunk {
    pub data: String,
}

/// Events pushed by a live session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake finished
    SetupComplete,
    /// The backend refused a prompt
    FilteredPrompt { text: String, reason: String },
    /// Audio, in playback order
    AudioChunks(Vec<AudioChunk>),
    /// The connection failed
    Error(String),
    /// The connection was closed by the backend
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Session is closed")]
    Closed,

    #[error("Malformed server message: {0}")]
    Protocol(String),
}

/// A live backend connection
pub trait Session: Send {
    fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), SessionError>;
    fn play(&mut self) -> Result<(), SessionError>;
    fn pause(&mut self) -> Result<(), SessionError>;
    fn stop(&mut self) -> Result<(), SessionError>;
    fn close(&mut self);
}

/// Opens sessions
pub trait SessionFactory: Send {
    /// Connect to `model`, delivering pushed events on `events`
    fn connect(
        &mut self,
        model: &str,
        events: flume::Sender<SessionEvent>,
    ) -> Result<Box<dyn Session>, SessionError>;
}

/// A server message in its JSON wire shape
///
/// ```json
/// {"setupComplete": {}}
/// {"filteredPrompt": {"text": "...", "filteredReason": "..."}}
/// {"serverContent": {"audioChunks": [{"data": "<base64>"}]}}
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    filtered_prompt: Option<FilteredPrompt>,
    #[serde(default)]
    server_content: Option<ServerContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilteredPrompt {
    #[serde(default)]
    text: String,
    #[serde(default, alias = "filteredReason")]
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    audio_chunks: Vec<AudioChunk>,
}

impl ServerMessage {
    pub fn parse(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(|e| SessionError::Protocol(e.to_string()))
    }

    /// Events carried by this message, in wire order
    pub fn into_events(self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(SessionEvent::SetupComplete);
        }
        if let Some(filtered) = self.filtered_prompt {
            events.push(SessionEvent::FilteredPrompt {
                text: filtered.text,
                reason: filtered.reason,
            });
        }
        if let Some(content) = self.server_content {
            if !content.audio_chunks.is_empty() {
                events.push(SessionEvent::AudioChunks(content.audio_chunks));
            }
        }
        events
    }
}
