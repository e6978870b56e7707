//! Capture containers and their encoders

use serde::{Deserialize, Serialize};

use super::RecorderError;
use crate::codec::quantize;

/// Compressed container for captured audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    OggVorbis,
    Flac,
}

impl ContainerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::OggVorbis => "ogg",
            ContainerFormat::Flac => "flac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::OggVorbis => "audio/ogg",
            ContainerFormat::Flac => "audio/flac",
        }
    }

    /// Whether this build can encode the container
    pub fn is_supported(self) -> bool {
        match self {
            ContainerFormat::OggVorbis => cfg!(feature = "vorbis"),
            ContainerFormat::Flac => true,
        }
    }

    /// First supported container in `preference`
    pub fn negotiate(preference: &[ContainerFormat]) -> Option<ContainerFormat> {
        preference.iter().copied().find(|f| f.is_supported())
    }
}

/// Encode interleaved samples into `format`
pub fn encode(
    format: ContainerFormat,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, RecorderError> {
    if channels == 0 {
        return Err(RecorderError::Encode("channel count must be at least 1".into()));
    }
    match format {
        ContainerFormat::Flac => encode_flac(samples, sample_rate, channels),
        ContainerFormat::OggVorbis => encode_vorbis(samples, sample_rate, channels),
    }
}

/// 16-bit FLAC
fn encode_flac(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, RecorderError> {
    use flacenc::component::BitRepr;
    use flacenc::error::Verify;

    let config = flacenc::config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| RecorderError::Encode(format!("flac config: {:?}", e)))?;

    let whole_frames = samples.len() - samples.len() % channels as usize;
    let pcm: Vec<i32> = samples[..whole_frames]
        .iter()
        .map(|&s| quantize(s) as i32)
        .collect();

    let source = flacenc::source::MemSource::from_samples(
        &pcm,
        channels as usize,
        16,
        sample_rate as usize,
    );
    let block_size = config.block_size;
    let mut stream = flacenc::encode_with_fixed_block_size(&config, source, block_size)
        .map_err(|e| RecorderError::Encode(format!("flac encode: {:?}", e)))?;

    // flacenc lowers min_block_size to the short final frame, which marks the
    // stream variable-blocksize while its frames are numbered as fixed.
    // Decoders then reject every frame header.
    stream
        .stream_info_mut()
        .set_block_sizes(block_size, block_size)
        .map_err(|e| RecorderError::Encode(format!("flac block sizes: {:?}", e)))?;

    let mut sink = flacenc::bitsink::ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| RecorderError::Encode(format!("flac write: {:?}", e)))?;

    Ok(sink.as_slice().to_vec())
}

#[cfg(feature = "vorbis")]
fn encode_vorbis(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, RecorderError> {
    use std::num::{NonZeroU32, NonZeroU8};

    let rate = NonZeroU32::new(sample_rate)
        .ok_or_else(|| RecorderError::Encode("sample rate must be non-zero".into()))?;
    let channel_count = u8::try_from(channels)
        .ok()
        .and_then(NonZeroU8::new)
        .ok_or_else(|| RecorderError::Encode(format!("unsupported channel count {}", channels)))?;

    let mut encoder = vorbis_rs::VorbisEncoderBuilder::new(rate, channel_count, Vec::new())
        .map_err(|e| RecorderError::Encode(format!("vorbis init: {}", e)))?
        .build()
        .map_err(|e| RecorderError::Encode(format!("vorbis build: {}", e)))?;

    // Interleaved → planar
    let planar: Vec<Vec<f32>> = (0..channels as usize)
        .map(|ch| {
            samples
                .iter()
                .skip(ch)
                .step_by(channels as usize)
                .copied()
                .collect()
        })
        .collect();

    encoder
        .encode_audio_block(&planar)
        .map_err(|e| RecorderError::Encode(format!("vorbis encode: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| RecorderError::Encode(format!("vorbis finish: {}", e)))
}

#[cfg(not(feature = "vorbis"))]
fn encode_vorbis(_samples: &[f32], _sample_rate: u32, _channels: u16) -> Result<Vec<u8>, RecorderError> {
    Err(RecorderError::UnsupportedFormat(ContainerFormat::OggVorbis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_prefers_first_supported() {
        let preference = [ContainerFormat::OggVorbis, ContainerFormat::Flac];
        let expected = if cfg!(feature = "vorbis") {
            ContainerFormat::OggVorbis
        } else {
            ContainerFormat::Flac
        };
        assert_eq!(ContainerFormat::negotiate(&preference), Some(expected));
        assert_eq!(ContainerFormat::negotiate(&[ContainerFormat::Flac]), Some(ContainerFormat::Flac));
        assert_eq!(ContainerFormat::negotiate(&[]), None);
    }

    #[test]
    fn test_flac_has_magic() {
        let samples: Vec<f32> = (0..9600).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let bytes = encode(ContainerFormat::Flac, &samples, 48000, 2).unwrap();
        assert_eq!(&bytes[..4], b"fLaC");
    }

    #[test]
    fn test_flac_stream_info_is_fixed_blocksize() {
        // 4800 frames: one full 4096 block plus a short tail
        let samples: Vec<f32> = (0..9600).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let bytes = encode(ContainerFormat::Flac, &samples, 48000, 2).unwrap();

        // STREAMINFO body starts after the marker and the 4-byte block header
        let min_block = u16::from_be_bytes([bytes[8], bytes[9]]);
        let max_block = u16::from_be_bytes([bytes[10], bytes[11]]);
        assert_eq!(min_block, max_block);
        assert_eq!(max_block, 4096);
    }

    #[test]
    fn test_flac_opens_with_symphonia() {
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let samples: Vec<f32> = (0..9600).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let bytes = encode(ContainerFormat::Flac, &samples, 48000, 2).unwrap();

        let mss = MediaSourceStream::new(Box::new(std::io::Cursor::new(bytes)), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("flac");
        let opened = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .unwrap();
        let params = &opened.format.tracks()[0].codec_params;
        assert_eq!(params.sample_rate, Some(48000));
        assert_eq!(params.n_frames, Some(4800));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&ContainerFormat::OggVorbis).unwrap(),
            "\"ogg_vorbis\""
        );
    }
}
