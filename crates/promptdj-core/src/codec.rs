//! PCM codec for session audio payloads
//!
//! The session delivers audio as base64 text wrapping little-endian signed
//! 16-bit PCM, interleaved frame by frame (`L R L R ...`). Decoding
//! normalizes to `[-1, 1]` by dividing by 32768 and de-interleaves into a
//! planar [`AudioBuffer`]. Encoding is the reverse and clamps first.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::types::{AudioBuffer, Sample};

/// Scale used when converting i16 → f32
const DECODE_SCALE: f32 = 32768.0;

/// Scale used when converting f32 → i16 (kept one below to avoid wrap at +1.0)
const ENCODE_SCALE: f32 = 32767.0;

/// Errors from decoding a PCM payload
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Channel count must be at least 1")]
    NoChannels,
}

/// Decode a base64 PCM payload into a planar buffer
///
/// A trailing partial frame (odd byte or incomplete channel set) is dropped.
pub fn decode_pcm(
    data: &str,
    sample_rate: u32,
    num_channels: u16,
) -> Result<AudioBuffer, CodecError> {
    let bytes = BASE64.decode(data.trim())?;
    pcm_bytes_to_buffer(&bytes, sample_rate, num_channels)
}

/// Convert raw little-endian i16 bytes into a planar buffer
pub fn pcm_bytes_to_buffer(
    bytes: &[u8],
    sample_rate: u32,
    num_channels: u16,
) -> Result<AudioBuffer, CodecError> {
    if num_channels == 0 {
        return Err(CodecError::NoChannels);
    }
    let channels = num_channels as usize;
    let frame_bytes = 2 * channels;
    let frames = bytes.len() / frame_bytes;

    let mut planar: Vec<Vec<Sample>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in bytes.chunks_exact(frame_bytes) {
        for (ch, pair) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            planar[ch].push(value as f32 / DECODE_SCALE);
        }
    }

    Ok(AudioBuffer::from_planar(planar, sample_rate))
}

/// Encode a planar buffer as base64 little-endian i16 PCM
pub fn encode_pcm(buffer: &AudioBuffer) -> String {
    BASE64.encode(buffer_to_pcm_bytes(buffer))
}

/// Interleave and quantize a buffer to little-endian i16 bytes
pub fn buffer_to_pcm_bytes(buffer: &AudioBuffer) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(buffer.frames() * buffer.num_channels() * 2);
    for sample in buffer.interleaved() {
        bytes.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    bytes
}

/// Clamp a float sample and convert it to i16
#[inline]
pub fn quantize(sample: Sample) -> i16 {
    (sample.clamp(-1.0, 1.0) * ENCODE_SCALE).round() as i16
}
