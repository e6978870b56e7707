//! Common types for PromptDJ
//!
//! Fundamental audio constants and the planar buffer type shared by the
//! codec, the output graph and the recorder.

/// Sample rate of the generated stream (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Channel count of the generated stream (stereo)
pub const NUM_AUDIO_CHANNELS: u16 = 2;

/// Number of prompt channels on the surface
pub const NUM_PROMPTS: usize = 16;

/// Audio sample type
pub type Sample = f32;

/// A decoded block of audio, stored planar (one `Vec` per channel)
///
/// All channel vectors have the same length. The output graph plays these
/// back at their scheduled start frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn silence(num_channels: u16, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; num_channels as usize],
            sample_rate,
        }
    }

    /// Build a buffer from planar channel data
    ///
    /// Channels longer than the shortest one are truncated so every channel
    /// has the same frame count.
    pub fn from_planar(mut channels: Vec<Vec<Sample>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Sample at `frame` on `channel`, silence when out of range
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> Sample {
        self.channels
            .get(channel)
            .and_then(|ch| ch.get(frame))
            .copied()
            .unwrap_or(0.0)
    }

    /// Interleave into `[L, R, L, R, ...]`
    pub fn interleaved(&self) -> Vec<Sample> {
        let channels = self.num_channels();
        let mut out = Vec::with_capacity(self.frames() * channels);
        for frame in 0..self.frames() {
            for ch in &self.channels {
                out.push(ch[frame]);
            }
        }
        out
    }
}
