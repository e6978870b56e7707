//! Lock-free output graph: scheduled voices, a gain stage and taps

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;
use rtrb::{Consumer, Producer, RingBuffer};

use super::gc::gc_handle;
use super::{AudioClock, OutputSink};
use crate::types::{AudioBuffer, Sample};

/// Capacity of the control → audio command ring
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Capacity of the tap attach/detach ring
const TAP_QUEUE_CAPACITY: usize = 16;

/// Voices preallocated on the audio side; schedules past this are dropped
const VOICE_CAPACITY: usize = 64;

/// Commands from the control thread to the audio thread
///
/// Buffers are `Shared` so the audio thread can release them without
/// freeing memory itself.
pub enum GraphCommand {
    Schedule {
        buffer: Shared<AudioBuffer>,
        start_frame: u64,
    },
    Gain {
        target: f32,
        start_frame: u64,
        end_frame: u64,
    },
    Flush {
        at_frame: u64,
    },
}

/// Which tap an attach/detach refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapKind {
    /// Interleaved post-gain samples
    Recorder,
    /// Mono (channel average) post-gain samples
    Meter,
}

enum TapCommand {
    Attach(TapKind, Producer<Sample>),
    Detach(TapKind),
}

/// Create a connected graph: control handle, tap handle and audio side
pub fn output_graph(sample_rate: u32, channels: u16) -> (GraphHandle, TapHandle, OutputGraph) {
    let (command_tx, command_rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    let (tap_tx, tap_rx) = RingBuffer::new(TAP_QUEUE_CAPACITY);
    let frames = Arc::new(AtomicU64::new(0));
    let dropped = Arc::new(AtomicU64::new(0));
    let channels = channels.max(1) as usize;

    let handle = GraphHandle {
        commands: command_tx,
        dropped: Arc::clone(&dropped),
        dropped_seen: 0,
        clock: GraphClock {
            frames: Arc::clone(&frames),
            sample_rate,
        },
    };
    let taps = TapHandle { commands: tap_tx };
    let graph = OutputGraph {
        commands: command_rx,
        tap_commands: tap_rx,
        voices: Vec::with_capacity(VOICE_CAPACITY),
        dropped,
        next_seq: 0,
        pending_flush: None,
        gain: GainRamp::constant(1.0),
        frame: 0,
        frames,
        channels,
        recorder_tap: None,
        meter_tap: None,
    };
    (handle, taps, graph)
}

/// Output clock backed by the rendered-frame counter
#[derive(Debug, Clone)]
pub struct GraphClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock for GraphClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate.max(1) as f64
    }
}

/// Control side of the graph (owned by the playback engine)
pub struct GraphHandle {
    commands: Producer<GraphCommand>,
    /// Schedules the audio side refused because every voice was busy
    dropped: Arc<AtomicU64>,
    dropped_seen: u64,
    clock: GraphClock,
}

impl GraphHandle {
    /// Clock that reads this graph's position
    pub fn clock(&self) -> GraphClock {
        self.clock.clone()
    }

    fn to_frame(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.clock.sample_rate as f64).round() as u64
    }

    /// Total schedules refused because every voice slot was taken
    pub fn dropped_voices(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn report_dropped(&mut self) {
        let dropped = self.dropped_voices();
        if dropped > self.dropped_seen {
            log::warn!(
                "Output: {} buffers dropped, all {} voices busy",
                dropped - self.dropped_seen,
                VOICE_CAPACITY
            );
            self.dropped_seen = dropped;
        }
    }

    fn send(&mut self, command: GraphCommand) {
        if self.commands.push(command).is_err() {
            log::warn!("Output: command queue full, dropping command");
        }
    }
}

impl OutputSink for GraphHandle {
    fn schedule(&mut self, buffer: AudioBuffer, start: f64) {
        self.report_dropped();
        let start_frame = self.to_frame(start);
        self.send(GraphCommand::Schedule {
            buffer: Shared::new(&gc_handle(), buffer),
            start_frame,
        });
    }

    fn ramp_gain(&mut self, target: f32, start: f64, end: f64) {
        let start_frame = self.to_frame(start);
        let end_frame = self.to_frame(end).max(start_frame);
        self.send(GraphCommand::Gain {
            target,
            start_frame,
            end_frame,
        });
    }

    fn flush(&mut self, at: f64) {
        let at_frame = self.to_frame(at);
        self.send(GraphCommand::Flush { at_frame });
    }
}

/// Attaches read-only taps to the graph
pub struct TapHandle {
    commands: Producer<TapCommand>,
}

impl TapHandle {
    /// Attach a tap holding up to `capacity` samples, replacing any previous
    /// tap of the same kind
    ///
    /// The audio thread never waits for the reader: samples that do not fit
    /// are dropped.
    pub fn attach(&mut self, kind: TapKind, capacity: usize) -> Option<Consumer<Sample>> {
        let (tx, rx) = RingBuffer::new(capacity.max(1));
        match self.commands.push(TapCommand::Attach(kind, tx)) {
            Ok(()) => Some(rx),
            Err(_) => {
                log::warn!("Output: tap queue full, cannot attach {:?} tap", kind);
                None
            }
        }
    }

    pub fn detach(&mut self, kind: TapKind) {
        if self.commands.push(TapCommand::Detach(kind)).is_err() {
            log::warn!("Output: tap queue full, cannot detach {:?} tap", kind);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GainRamp {
    from: f32,
    to: f32,
    start: u64,
    end: u64,
}

impl GainRamp {
    fn constant(value: f32) -> Self {
        Self {
            from: value,
            to: value,
            start: 0,
            end: 0,
        }
    }

    #[inline]
    fn value_at(&self, frame: u64) -> f32 {
        if frame >= self.end {
            self.to
        } else if frame <= self.start {
            self.from
        } else {
            let t = (frame - self.start) as f32 / (self.end - self.start) as f32;
            self.from + (self.to - self.from) * t
        }
    }
}

struct Voice {
    buffer: Shared<AudioBuffer>,
    start_frame: u64,
    seq: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.buffer.frames() as u64
    }

    #[inline]
    fn sample(&self, channel: usize, frame: u64) -> Sample {
        if frame < self.start_frame {
            return 0.0;
        }
        self.buffer
            .sample(channel, (frame - self.start_frame) as usize)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingFlush {
    at_frame: u64,
    /// Voices scheduled before the flush was requested have a lower seq
    before_seq: u64,
}

/// Audio side of the graph
pub struct OutputGraph {
    commands: Consumer<GraphCommand>,
    tap_commands: Consumer<TapCommand>,
    voices: Vec<Voice>,
    dropped: Arc<AtomicU64>,
    next_seq: u64,
    pending_flush: Option<PendingFlush>,
    gain: GainRamp,
    frame: u64,
    frames: Arc<AtomicU64>,
    channels: usize,
    recorder_tap: Option<Producer<Sample>>,
    meter_tap: Option<Producer<Sample>>,
}

impl OutputGraph {
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Render interleaved output into `out`
    ///
    /// Called from the audio callback: no locks, no blocking.
    pub fn render(&mut self, out: &mut [f32]) {
        self.process_commands();

        let channels = self.channels;
        let mut rendered = 0u64;

        for frame_out in out.chunks_exact_mut(channels) {
            let frame = self.frame + rendered;

            if let Some(flush) = self.pending_flush {
                if frame >= flush.at_frame {
                    self.voices.retain(|v| v.seq >= flush.before_seq);
                    self.pending_flush = None;
                }
            }

            let gain = self.gain.value_at(frame);
            let mut mono = 0.0;
            for (ch, slot) in frame_out.iter_mut().enumerate() {
                let sum: Sample = self.voices.iter().map(|v| v.sample(ch, frame)).sum();
                let sample = sum * gain;
                *slot = sample;
                mono += sample;
                if let Some(tap) = self.recorder_tap.as_mut() {
                    let _ = tap.push(sample);
                }
            }
            if let Some(tap) = self.meter_tap.as_mut() {
                let _ = tap.push(mono / channels as Sample);
            }
            rendered += 1;
        }

        // Trailing partial frame, if the host ever hands us one
        let remainder = out.len() % channels;
        let len = out.len();
        for slot in &mut out[len - remainder..] {
            *slot = 0.0;
        }

        self.frame += rendered;
        self.frames.store(self.frame, Ordering::Release);

        let now = self.frame;
        self.voices.retain(|v| v.end_frame() > now);
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                GraphCommand::Schedule {
                    buffer,
                    start_frame,
                } => {
                    // Never grow past the preallocated slots
                    if self.voices.len() >= VOICE_CAPACITY {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    self.voices.push(Voice {
                        buffer,
                        start_frame,
                        seq: self.next_seq,
                    });
                    self.next_seq += 1;
                }
                GraphCommand::Gain {
                    target,
                    start_frame,
                    end_frame,
                } => {
                    let from = self.gain.value_at(self.frame.max(start_frame));
                    self.gain = GainRamp {
                        from,
                        to: target,
                        start: start_frame,
                        end: end_frame,
                    };
                }
                GraphCommand::Flush { at_frame } => {
                    self.pending_flush = Some(PendingFlush {
                        at_frame,
                        before_seq: self.next_seq,
                    });
                }
            }
        }

        while let Ok(command) = self.tap_commands.pop() {
            match command {
                TapCommand::Attach(TapKind::Recorder, tap) => self.recorder_tap = Some(tap),
                TapCommand::Attach(TapKind::Meter, tap) => self.meter_tap = Some(tap),
                TapCommand::Detach(TapKind::Recorder) => self.recorder_tap = None,
                TapCommand::Detach(TapKind::Meter) => self.meter_tap = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32, frames: usize) -> AudioBuffer {
        AudioBuffer::from_planar(vec![vec![value; frames], vec![value; frames]], 100)
    }

    /// Render `frames` stereo frames and return the left channel
    fn render_left(graph: &mut OutputGraph, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        graph.render(&mut out);
        out.chunks(2).map(|f| f[0]).collect()
    }

    #[test]
    fn test_voice_plays_at_start_frame() {
        let (mut handle, _taps, mut graph) = output_graph(100, 2);
        handle.schedule(constant(0.5, 3), 0.02);

        let left = render_left(&mut graph, 6);
        assert_eq!(left, vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.0]);
        assert!((handle.clock().now() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_consecutive_voices_are_gapless() {
        let (mut handle, _taps, mut graph) = output_graph(100, 2);
        handle.schedule(constant(0.25, 2), 0.0);
        handle.schedule(constant(0.75, 2), 0.02);

        assert_eq!(render_left(&mut graph, 4), vec![0.25, 0.25, 0.75, 0.75]);
    }

    #[test]
    fn test_gain_ramp() {
        let (mut handle, _taps, mut graph) = output_graph(100, 2);
        handle.schedule(constant(1.0, 10), 0.0);
        handle.set_gain(0.0, 0.0);
        handle.ramp_gain(1.0, 0.0, 0.04);

        let left = render_left(&mut graph, 6);
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0, 1.0];
        for (got, want) in left.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[test]
    fn test_flush_only_drops_earlier_voices() {
        let (mut handle, _taps, mut graph) = output_graph(100, 2);
        handle.schedule(constant(0.5, 10), 0.0);
        handle.flush(0.02);
        handle.schedule(constant(0.25, 10), 0.04);

        let left = render_left(&mut graph, 6);
        assert_eq!(left, vec![0.5, 0.5, 0.0, 0.0, 0.25, 0.25]);
    }

    #[test]
    fn test_taps_receive_post_gain_audio() {
        let (mut handle, mut taps, mut graph) = output_graph(100, 2);
        let mut recorder = taps.attach(TapKind::Recorder, 64).unwrap();
        let mut meter = taps.attach(TapKind::Meter, 64).unwrap();

        let buffer = AudioBuffer::from_planar(vec![vec![1.0; 2], vec![0.5; 2]], 100);
        handle.schedule(buffer, 0.0);
        handle.set_gain(0.5, 0.0);
        render_left(&mut graph, 2);

        let recorded: Vec<f32> = std::iter::from_fn(|| recorder.pop().ok()).collect();
        assert_eq!(recorded, vec![0.5, 0.25, 0.5, 0.25]);
        let metered: Vec<f32> = std::iter::from_fn(|| meter.pop().ok()).collect();
        assert_eq!(metered, vec![0.375, 0.375]);

        taps.detach(TapKind::Recorder);
        render_left(&mut graph, 2);
        assert!(recorder.pop().is_err());
    }

    #[test]
    fn test_full_tap_drops_samples() {
        let (mut handle, mut taps, mut graph) = output_graph(100, 2);
        let mut recorder = taps.attach(TapKind::Recorder, 4).unwrap();
        handle.schedule(constant(1.0, 8), 0.0);

        render_left(&mut graph, 8);
        let recorded: Vec<f32> = std::iter::from_fn(|| recorder.pop().ok()).collect();
        assert_eq!(recorded.len(), 4);
    }

    #[test]
    fn test_voices_never_exceed_capacity() {
        let (mut handle, _taps, mut graph) = output_graph(100, 2);
        let slots = graph.voices.capacity();
        for _ in 0..VOICE_CAPACITY + 3 {
            handle.schedule(constant(0.01, 50), 0.0);
        }

        render_left(&mut graph, 1);
        assert_eq!(graph.voices.len(), VOICE_CAPACITY);
        assert_eq!(graph.voices.capacity(), slots);
        assert_eq!(handle.dropped_voices(), 3);

        // finished voices free their slots
        render_left(&mut graph, 60);
        assert!(graph.voices.is_empty());
        handle.schedule(constant(0.5, 2), 0.61);
        assert_eq!(render_left(&mut graph, 2), vec![0.5, 0.5]);
        assert_eq!(handle.dropped_voices(), 3);
    }
}
