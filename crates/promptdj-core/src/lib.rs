//! PromptDJ Core - playback engine, channel state and recording for the
//! PromptDJ control surface
//!
//! Sixteen prompt channels steer a real-time generative-music session. The
//! session streams base64 PCM chunks which are scheduled gaplessly against a
//! lookahead buffer, played through a cpal output, metered and optionally
//! recorded.

pub mod channels;
pub mod codec;
pub mod config;
pub mod engine;
pub mod level;
pub mod notify;
pub mod output;
pub mod persistence;
pub mod presets;
pub mod recorder;
pub mod session;
pub mod surface;
pub mod types;

pub use surface::{ControlSurface, SurfaceDeps, SurfaceError};
pub use types::*;
