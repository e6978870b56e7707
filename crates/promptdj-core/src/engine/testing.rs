//! Test doubles for the engine's injected dependencies

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use flume::Sender;

use crate::output::{AudioClock, OutputSink};
use crate::session::{Session, SessionError, SessionEvent, SessionFactory, WeightedPrompt};
use crate::types::AudioBuffer;

/// Clock moved by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn at(now: f64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

/// What the engine asked the output to do
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Schedule { start: f64, duration: f64 },
    Gain { target: f32, start: f64, end: f64 },
    Flush { at: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn scheduled_starts(&self) -> Vec<f64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Schedule { start, .. } => Some(*start),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn schedule(&mut self, buffer: AudioBuffer, start: f64) {
        self.calls.lock().unwrap().push(SinkCall::Schedule {
            start,
            duration: buffer.duration(),
        });
    }

    fn ramp_gain(&mut self, target: f32, start: f64, end: f64) {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Gain { target, start, end });
    }

    fn flush(&mut self, at: f64) {
        self.calls.lock().unwrap().push(SinkCall::Flush { at });
    }
}

/// What the engine asked the session to do
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Connect(String),
    SetPrompts(Vec<WeightedPrompt>),
    Play,
    Pause,
    Stop,
    Close,
}

/// Factory whose sessions record every call into one shared log
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    pub calls: Arc<Mutex<Vec<SessionCall>>>,
    /// Event sender of the latest connection
    pub events: Arc<Mutex<Option<Sender<SessionEvent>>>>,
    pub fail_connect: Arc<AtomicBool>,
    pub fail_push: Arc<AtomicBool>,
}

impl RecordingFactory {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &SessionCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn pushes(&self) -> Vec<Vec<WeightedPrompt>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SessionCall::SetPrompts(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Push an event from the backend side of the latest connection
    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}

impl SessionFactory for RecordingFactory {
    fn connect(
        &mut self,
        model: &str,
        events: Sender<SessionEvent>,
    ) -> Result<Box<dyn Session>, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push(SessionCall::Connect(model.to_string()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(SessionError::Connection("refused".into()));
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(Box::new(RecordingSession {
            calls: Arc::clone(&self.calls),
            fail_push: Arc::clone(&self.fail_push),
        }))
    }
}

struct RecordingSession {
    calls: Arc<Mutex<Vec<SessionCall>>>,
    fail_push: Arc<AtomicBool>,
}

impl RecordingSession {
    fn record(&self, call: SessionCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Session for RecordingSession {
    fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), SessionError> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.record(SessionCall::SetPrompts(prompts.to_vec()));
        Ok(())
    }

    fn play(&mut self) -> Result<(), SessionError> {
        self.record(SessionCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        self.record(SessionCall::Pause);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.record(SessionCall::Stop);
        Ok(())
    }

    fn close(&mut self) {
        self.record(SessionCall::Close);
    }
}
