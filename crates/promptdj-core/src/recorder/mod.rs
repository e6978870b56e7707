//! Recording of the output and conversion to downloadable files
//!
//! The [`Recorder`] reads the graph's recorder tap while a take is running.
//! Stopping encodes the take into the negotiated compressed container right
//! away and converts it to WAV on a worker thread.

mod artifact;
mod format;
mod recorder;
mod transcode;

pub use artifact::{Artifact, ArtifactFormat};
pub use format::{encode, ContainerFormat};
pub use recorder::{Recorder, RecorderEvent, NO_AUDIO_CAPTURED, RECORDER_TAP_CAPACITY};
pub use transcode::{decode, write_wav, DecodedAudio};

use thiserror::Error;

/// Errors from capture, encoding and conversion
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("None of the configured recording formats is supported")]
    NoSupportedFormat,

    #[error("Recording format not supported in this build: {0:?}")]
    UnsupportedFormat(ContainerFormat),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
