//! Output stream errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Cannot query output configurations: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error(
        "Output device {device} cannot play {channels} channel f32 audio at {sample_rate} Hz (supports: {supported})"
    )]
    UnsupportedConfig {
        device: String,
        channels: u16,
        sample_rate: u32,
        supported: String,
    },

    #[error("Cannot open output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Cannot start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub type AudioResult<T> = Result<T, AudioError>;
