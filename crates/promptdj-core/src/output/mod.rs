//! The single audio output
//!
//! The control thread owns a [`GraphHandle`] (scheduling, gain, flush) and a
//! [`TapHandle`] (read-only taps). The audio thread owns the
//! [`OutputGraph`] and calls [`OutputGraph::render`] once per callback.
//! Both sides talk through `rtrb` rings, so the audio thread never waits on
//! the control thread.
//!
//! Times cross this boundary in seconds on the output clock, which counts
//! rendered frames.

mod error;
mod gc;
mod graph;
mod stream;

pub use error::{AudioError, AudioResult};
pub use graph::{output_graph, GraphClock, GraphHandle, OutputGraph, TapHandle, TapKind};
pub use stream::StreamOutput;

use crate::types::AudioBuffer;

/// Current time on the output clock, in seconds
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Control side of the output: where decoded audio goes
pub trait OutputSink: Send {
    /// Play `buffer` starting at `start` seconds
    fn schedule(&mut self, buffer: AudioBuffer, start: f64);

    /// Ramp the master gain linearly to `target` between `start` and `end`
    fn ramp_gain(&mut self, target: f32, start: f64, end: f64);

    /// Jump the master gain to `value` at `at`
    fn set_gain(&mut self, value: f32, at: f64) {
        self.ramp_gain(value, at, at);
    }

    /// Discard everything scheduled so far once `at` is reached
    fn flush(&mut self, at: f64);
}
