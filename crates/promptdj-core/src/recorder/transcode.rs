//! Compressed → WAV conversion
//!
//! Decodes the compressed capture with symphonia and writes 16-bit PCM WAV
//! with hound. Runs on a worker thread; the result comes back over a flume
//! channel tagged with the recording generation that requested it.

use std::io::Cursor;
use std::path::PathBuf;
use std::thread::JoinHandle;

use flume::Sender;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::artifact::{Artifact, ArtifactFormat};
use super::{ContainerFormat, RecorderError};
use crate::codec::quantize;

/// Result of one background conversion
#[derive(Debug)]
pub struct TranscodeOutcome {
    pub generation: u64,
    pub result: Result<Artifact, RecorderError>,
}

/// Decoded interleaved audio
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Start converting `encoded` into a WAV file at `dest`
pub fn spawn_transcode(
    generation: u64,
    encoded: Vec<u8>,
    format: ContainerFormat,
    dest: PathBuf,
    results: Sender<TranscodeOutcome>,
) -> Result<JoinHandle<()>, RecorderError> {
    std::thread::Builder::new()
        .name("promptdj-transcode".into())
        .spawn(move || {
            log::info!("Recorder: transcoding generation {} to WAV", generation);
            let result = decode(encoded, format).and_then(|audio| {
                write_wav(&audio, &dest)?;
                Artifact::adopt(dest, ArtifactFormat::Wav)
            });
            if let Err(e) = &result {
                log::error!("Recorder: WAV transcode failed: {}", e);
            }
            if results.send(TranscodeOutcome { generation, result }).is_err() {
                log::debug!("Recorder: transcode result dropped (recorder gone)");
            }
        })
        .map_err(RecorderError::from)
}

/// Decode a compressed capture held in memory
pub fn decode(encoded: Vec<u8>, format: ContainerFormat) -> Result<DecodedAudio, RecorderError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(encoded)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| RecorderError::Decode(e.to_string()))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| RecorderError::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| RecorderError::Decode("Unknown sample rate".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| RecorderError::Decode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(RecorderError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::warn!("Recorder: skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(RecorderError::Decode(e.to_string())),
        };

        if sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels as usize)
        {
            let spec = *decoded.spec();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Write 16-bit PCM WAV
pub fn write_wav(audio: &DecodedAudio, dest: &std::path::Path) -> Result<(), RecorderError> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dest, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(quantize(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::format::encode;

    fn tone(frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin() * 0.5;
                [s, -s]
            })
            .collect()
    }

    #[test]
    fn test_flac_decodes_back() {
        let samples = tone(4800);
        let encoded = encode(ContainerFormat::Flac, &samples, 48000, 2).unwrap();
        let decoded = decode(encoded, ContainerFormat::Flac).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), samples.len());
        assert!((decoded.samples[200] - samples[200]).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(decode(b"definitely not audio".to_vec(), ContainerFormat::Flac).is_err());
    }

    #[test]
    fn test_background_transcode_writes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("take.wav");
        let encoded = encode(ContainerFormat::Flac, &tone(2400), 48000, 2).unwrap();
        let (tx, rx) = flume::unbounded();

        spawn_transcode(7, encoded, ContainerFormat::Flac, dest.clone(), tx)
            .unwrap()
            .join()
            .unwrap();

        let outcome = rx.recv().unwrap();
        assert_eq!(outcome.generation, 7);
        let artifact = outcome.result.unwrap();
        assert_eq!(artifact.path(), dest.as_path());

        let reader = hound::WavReader::open(&dest).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.len(), 4800);
    }
}
