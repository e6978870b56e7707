//! cpal stream driving the output graph

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use super::{AudioError, AudioResult, OutputGraph};

/// A running output stream
///
/// Audio stops when this is dropped.
pub struct StreamOutput {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
}

impl StreamOutput {
    /// Open the default output device and start rendering `graph`
    pub fn start(mut graph: OutputGraph, sample_rate: u32) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Output: Using device {}", device_name);

        let channels = graph.channels() as u16;
        let ranges: Vec<SupportedStreamConfigRange> = device.supported_output_configs()?.collect();
        if !supports(&ranges, channels, sample_rate) {
            return Err(AudioError::UnsupportedConfig {
                device: device_name,
                channels,
                sample_rate,
                supported: describe(&ranges),
            });
        }

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        log::info!(
            "Output: {} channels at {} Hz",
            config.channels,
            sample_rate
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    graph.render(data);
                },
                move |err| {
                    log::error!("Output: Stream error: {}", err);
                },
                None, // No timeout (blocking)
            )?;

        stream.play()?;

        log::info!("Output: Stream started");

        Ok(Self {
            _stream: stream,
            device_name,
            sample_rate,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Whether any range plays f32 at exactly `channels` and `sample_rate`
///
/// The graph renders at a fixed rate, so there is no fallback rate.
fn supports(ranges: &[SupportedStreamConfigRange], channels: u16, sample_rate: u32) -> bool {
    ranges.iter().any(|c| {
        c.sample_format() == SampleFormat::F32
            && c.channels() == channels
            && sample_rate >= c.min_sample_rate().0
            && sample_rate <= c.max_sample_rate().0
    })
}

fn describe(ranges: &[SupportedStreamConfigRange]) -> String {
    if ranges.is_empty() {
        return "nothing".to_string();
    }
    ranges
        .iter()
        .map(|c| {
            format!(
                "{}ch {:?} {}-{} Hz",
                c.channels(),
                c.sample_format(),
                c.min_sample_rate().0,
                c.max_sample_rate().0
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
