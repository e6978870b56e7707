//! Configuration for the PromptDJ control surface
//!
//! Settings are stored in YAML at `~/.config/promptdj/config.yaml` (see
//! [`default_config_path`]). Every section has serde defaults, so a partial
//! file only overrides what it names.

mod io;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_path, default_data_dir};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::recorder::ContainerFormat;
use crate::types::{NUM_AUDIO_CHANNELS, SAMPLE_RATE};

/// Model requested from the generative-music backend
pub const DEFAULT_MODEL: &str = "lyria-realtime-exp";

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Backend model name
    pub model: String,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
    pub input: InputConfig,
    pub recording: RecordingConfig,
    pub notices: NoticeConfig,
    /// Directory for persisted state (presets, last snapshot)
    ///
    /// `None` uses `<data dir>/state`.
    pub storage_dir: Option<PathBuf>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            playback: PlaybackConfig::default(),
            audio: AudioConfig::default(),
            input: InputConfig::default(),
            recording: RecordingConfig::default(),
            notices: NoticeConfig::default(),
            storage_dir: None,
        }
    }
}

impl SurfaceConfig {
    /// Load from the default config path (defaults when absent or invalid)
    pub fn load() -> Self {
        load_config(&default_config_path())
    }

    /// Write to the default config path
    pub fn save(&self) -> anyhow::Result<()> {
        save_config(self, &default_config_path())
    }

    /// Resolved directory for persisted state
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("state"))
    }
}

/// Playback engine timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Lookahead buffer in seconds
    pub buffer_time_secs: f64,
    /// Minimum spacing of prompt pushes to the session
    pub push_interval_ms: u64,
    /// Fade-in on play
    pub fade_in_ms: u64,
    /// Fade-out on pause
    pub pause_fade_ms: u64,
    /// Fade-out on stop
    pub stop_fade_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_time_secs: 2.0,
            push_interval_ms: 200,
            fade_in_ms: 200,
            pause_fade_ms: 200,
            stop_fade_ms: 100,
        }
    }
}

impl PlaybackConfig {
    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    pub fn fade_in_secs(&self) -> f64 {
        self.fade_in_ms as f64 / 1000.0
    }

    pub fn pause_fade_secs(&self) -> f64 {
        self.pause_fade_ms as f64 / 1000.0
    }

    pub fn stop_fade_secs(&self) -> f64 {
        self.stop_fade_ms as f64 / 1000.0
    }
}

/// Stream format of the generated audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: NUM_AUDIO_CHANNELS,
        }
    }
}

/// Pointer and wheel sensitivities (weight units per pixel / scroll unit)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub knob_sensitivity: f32,
    pub slider_sensitivity: f32,
    pub wheel_sensitivity: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            knob_sensitivity: 0.01,
            slider_sensitivity: 0.02,
            wheel_sensitivity: 0.0025,
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Containers to try, most preferred first
    pub format_preference: Vec<ContainerFormat>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format_preference: vec![ContainerFormat::OggVorbis, ContainerFormat::Flac],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    pub duration_ms: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self { duration_ms: 4000 }
    }
}

impl NoticeConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
