//! Output level meter
//!
//! Reads the mono meter tap and reduces it to one loudness value in
//! `[0, 1]` for the UI:
//!
//! ```text
//! window   = last 256 samples × Blackman
//! mag[k]   = |FFT(window)[k]| / 256                 (k < 128)
//! smooth   = 0.8 · smooth + 0.2 · mag
//! level[k] = clamp((dB(smooth[k]) + 100) / 70, 0, 1)
//! output   = mean(level)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rtrb::Consumer;

use crate::types::Sample;

/// Analysis window in samples
pub const FFT_SIZE: usize = 256;

/// Floor of the displayed range
pub const MIN_DECIBELS: f32 = -100.0;

/// Ceiling of the displayed range
pub const MAX_DECIBELS: f32 = -30.0;

/// Weight of the previous spectrum in time smoothing
pub const SMOOTHING: f32 = 0.8;

const NUM_BINS: usize = FFT_SIZE / 2;

pub struct LevelMeter {
    tap: Option<Consumer<Sample>>,
    history: VecDeque<f32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<realfft::num_complex::Complex<f32>>,
    scratch: Vec<realfft::num_complex::Complex<f32>>,
    level: f32,
}

impl LevelMeter {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        Self {
            tap: None,
            history: VecDeque::with_capacity(FFT_SIZE),
            window: blackman(FFT_SIZE),
            smoothed: vec![0.0; NUM_BINS],
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            level: 0.0,
        }
    }

    /// Read from `tap` from now on
    pub fn attach(&mut self, tap: Consumer<Sample>) {
        self.tap = Some(tap);
    }

    pub fn detach(&mut self) {
        self.tap = None;
    }

    /// Last computed level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Drain the tap and recompute the level
    pub fn update(&mut self) -> f32 {
        let mut incoming = Vec::new();
        if let Some(tap) = self.tap.as_mut() {
            while let Ok(sample) = tap.pop() {
                incoming.push(sample);
            }
        }
        self.process(&incoming)
    }

    /// Feed samples directly and recompute the level
    pub fn process(&mut self, samples: &[Sample]) -> f32 {
        for &sample in samples {
            if self.history.len() == FFT_SIZE {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }

        // Zero-pad on the left until a full window has arrived
        let pad = FFT_SIZE - self.history.len();
        for (i, slot) in self.input.iter_mut().enumerate() {
            let sample = if i < pad {
                0.0
            } else {
                self.history[i - pad]
            };
            *slot = sample * self.window[i];
        }

        if let Err(e) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            log::warn!("Level: FFT failed: {:?}", e);
            return self.level;
        }

        let mut total = 0.0;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = (bin.re * bin.re + bin.im * bin.im).sqrt() / FFT_SIZE as f32;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
            total += normalize_db(*smoothed);
        }
        self.level = total / NUM_BINS as f32;
        self.level
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a linear magnitude onto `[0, 1]` across the dB range
fn normalize_db(magnitude: f32) -> f32 {
    if magnitude <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0)
}

fn blackman(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|n| {
            let x = n as f32 / size as f32;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}
