//! The playback engine
//!
//! Owns the session, the output graph's control side and the playback state
//! machine. Everything runs on the control thread: the surface calls the
//! transport methods directly and [`PlaybackEngine::tick`] drains channel
//! snapshots and session events, fires due tasks and flushes the push
//! throttle.

use std::collections::HashSet;
use std::sync::Arc;

use flume::{Receiver, Sender};

use super::scheduler::{LookaheadScheduler, Placement};
use super::throttle::PushThrottle;
use super::timer::{TaskId, TaskQueue};
use super::{EngineEvent, PlaybackState, StopReason};
use crate::channels::{default_channels, Channel, MixUpdate};
use crate::codec::decode_pcm;
use crate::config::SurfaceConfig;
use crate::notify::Notifier;
use crate::output::{AudioClock, OutputSink};
use crate::session::{AudioChunk, Session, SessionError, SessionEvent, SessionFactory, WeightedPrompt};

pub const NEED_ACTIVE_PROMPT: &str = "There needs to be one active prompt to play.";
pub const CONNECTION_LOST: &str = "Connection error, please restart audio.";
pub const REBUFFERING: &str = "Re-buffering";

/// Timing and format settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub model: String,
    /// Lookahead in seconds
    pub buffer_time: f64,
    /// Minimum spacing of prompt pushes in seconds
    pub push_interval: f64,
    pub fade_in: f64,
    pub pause_fade: f64,
    pub stop_fade: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl EngineSettings {
    pub fn from_config(config: &SurfaceConfig) -> Self {
        Self {
            model: config.model.clone(),
            buffer_time: config.playback.buffer_time_secs,
            push_interval: config.playback.push_interval().as_secs_f64(),
            fade_in: config.playback.fade_in_secs(),
            pause_fade: config.playback.pause_fade_secs(),
            stop_fade: config.playback.stop_fade_secs(),
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&SurfaceConfig::default())
    }
}

/// Deferred engine transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineTask {
    /// Lookahead filled: `Loading → Playing` if still loading
    EnterPlaying,
}

pub struct PlaybackEngine {
    settings: EngineSettings,
    factory: Box<dyn SessionFactory>,
    session: Option<Box<dyn Session>>,
    session_rx: Option<Receiver<SessionEvent>>,
    setup_complete: bool,
    mix_rx: Receiver<MixUpdate>,
    prompts: Vec<Channel>,
    filtered: HashSet<String>,
    state: PlaybackState,
    scheduler: LookaheadScheduler,
    timers: TaskQueue<EngineTask>,
    start_task: Option<TaskId>,
    throttle: PushThrottle,
    clock: Arc<dyn AudioClock>,
    output: Box<dyn OutputSink>,
    events: Sender<EngineEvent>,
    notifier: Notifier,
}

impl PlaybackEngine {
    /// Create a stopped engine; returns it with its event receiver
    pub fn new(
        settings: EngineSettings,
        factory: Box<dyn SessionFactory>,
        clock: Arc<dyn AudioClock>,
        output: Box<dyn OutputSink>,
        mix_rx: Receiver<MixUpdate>,
        notifier: Notifier,
    ) -> (Self, Receiver<EngineEvent>) {
        let (events, events_rx) = flume::unbounded();
        let engine = Self {
            scheduler: LookaheadScheduler::new(settings.buffer_time),
            throttle: PushThrottle::new(settings.push_interval),
            settings,
            factory,
            session: None,
            session_rx: None,
            setup_complete: false,
            mix_rx,
            prompts: default_channels(),
            filtered: HashSet::new(),
            state: PlaybackState::Stopped,
            timers: TaskQueue::new(),
            start_task: None,
            clock,
            output,
            events,
            notifier,
        };
        (engine, events_rx)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// Start time of the next chunk on the output clock
    pub fn lookahead(&self) -> Option<f64> {
        self.scheduler.next_start()
    }

    /// Texts the session refused
    pub fn filtered(&self) -> &HashSet<String> {
        &self.filtered
    }

    /// Channels with weight > 0 whose text is not filtered, in slot order
    pub fn active_prompts(&self) -> Vec<WeightedPrompt> {
        self.prompts
            .iter()
            .filter(|c| c.is_active() && !self.filtered.contains(&c.text))
            .map(|c| WeightedPrompt {
                text: c.text.clone(),
                weight: c.weight,
            })
            .collect()
    }

    /// Open a fresh session, replacing any existing one
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.drop_session();
        let (tx, rx) = flume::unbounded();
        log::info!("Engine: connecting to model {}", self.settings.model);
        let session = self.factory.connect(&self.settings.model, tx)?;
        self.session = Some(session);
        self.session_rx = Some(rx);
        Ok(())
    }

    pub fn play(&mut self) {
        // The guard and the first push must see the latest snapshot
        self.drain_mix_updates();
        if !matches!(self.state, PlaybackState::Stopped | PlaybackState::Paused) {
            log::debug!("Engine: play ignored in {:?}", self.state);
            return;
        }
        if self.active_prompts().is_empty() {
            self.notifier.warn(NEED_ACTIVE_PROMPT);
            return;
        }
        if self.session.is_none() {
            if let Err(e) = self.connect() {
                log::error!("Engine: connect failed: {}", e);
                self.notifier.error(e.to_string());
                self.set_state(PlaybackState::Stopped);
                return;
            }
        }

        self.set_state(PlaybackState::Loading);
        let now = self.clock.now();
        self.output.set_gain(0.0, now);
        self.output
            .ramp_gain(1.0, now, now + self.settings.fade_in);

        self.throttle.mark_pushed(now);
        if !self.push_active() {
            return;
        }
        let result = match self.session.as_mut() {
            Some(session) => session.play(),
            None => Err(SessionError::Closed),
        };
        if let Err(e) = result {
            log::error!("Engine: session play failed: {}", e);
            self.notifier.error(e.to_string());
            self.stop(StopReason::Error);
        }
    }

    /// Pause; a no-op unless playing or loading
    pub fn pause(&mut self) {
        if !self.state.accepts_audio() {
            log::debug!("Engine: pause ignored in {:?}", self.state);
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.pause() {
                log::warn!("Engine: session pause failed: {}", e);
            }
        }
        self.fade_out_and_flush(self.settings.pause_fade);
        self.set_state(PlaybackState::Paused);
    }

    pub fn stop(&mut self, reason: StopReason) {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.stop() {
                log::warn!("Engine: session stop failed: {}", e);
            }
        }
        self.fade_out_and_flush(self.settings.stop_fade);
        self.throttle.clear();
        self.set_state(PlaybackState::Stopped);
        log::info!("Engine: stopped ({:?})", reason);
        self.publish(EngineEvent::Stopped { reason });
    }

    /// Play/pause button behavior
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused | PlaybackState::Stopped => self.play(),
            PlaybackState::Loading => self.stop(StopReason::Manual),
        }
    }

    /// Drain inputs, fire due tasks and flush the throttle
    pub fn tick(&mut self) {
        self.drain_mix_updates();

        while let Some(event) = self.session_rx.as_ref().and_then(|rx| rx.try_recv().ok()) {
            self.handle_session_event(event);
        }

        let now = self.clock.now();
        for (id, task) in self.timers.take_due(now) {
            if self.start_task == Some(id) {
                self.start_task = None;
            }
            self.run_task(task);
        }

        self.flush_push();
    }

    /// Close the session (application exit)
    pub fn shutdown(&mut self) {
        self.drop_session();
    }

    fn drain_mix_updates(&mut self) {
        let mut latest = None;
        let mut clear_filtered = false;
        for update in self.mix_rx.try_iter() {
            clear_filtered |= update.clear_filtered;
            latest = Some(update.prompts);
        }
        let Some(prompts) = latest else {
            return;
        };
        if clear_filtered && !self.filtered.is_empty() {
            log::debug!("Engine: clearing {} filtered prompts", self.filtered.len());
            self.filtered.clear();
        }
        self.prompts = prompts;
        self.throttle.request();
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SetupComplete => {
                log::info!("Engine: session setup complete");
                self.setup_complete = true;
                if self.active_prompts().is_empty() && self.state.accepts_audio() {
                    self.pause();
                }
            }
            SessionEvent::FilteredPrompt { text, reason } => {
                log::warn!("Engine: prompt {:?} filtered: {}", text, reason);
                let message = if reason.is_empty() {
                    format!("Prompt \"{}\" was filtered", text)
                } else {
                    reason.clone()
                };
                self.notifier.warn(message);
                self.filtered.insert(text.clone());
                self.publish(EngineEvent::PromptFiltered { text, reason });
                self.throttle.request();
            }
            SessionEvent::AudioChunks(chunks) => self.handle_chunks(chunks),
            SessionEvent::Error(message) => {
                log::error!("Engine: session error: {}", message);
                self.connection_lost();
            }
            SessionEvent::Closed => {
                log::warn!("Engine: session closed");
                self.connection_lost();
            }
        }
    }

    fn handle_chunks(&mut self, chunks: Vec<AudioChunk>) {
        for chunk in chunks {
            if !self.state.accepts_audio() {
                log::trace!("Engine: dropping chunk in {:?}", self.state);
                return;
            }
            let buffer = match decode_pcm(
                &chunk.data,
                self.settings.sample_rate,
                self.settings.channels,
            ) {
                Ok(buffer) => buffer,
                Err(e) => {
                    log::warn!("Engine: undecodable chunk: {}", e);
                    continue;
                }
            };

            let now = self.clock.now();
            let (start, placement) = self.scheduler.place(now, buffer.duration());
            match placement {
                Placement::Primed => self.arm_start(start),
                Placement::Underrun => {
                    log::warn!("Engine: underrun at {:.3}s, re-buffering", now);
                    self.set_state(PlaybackState::Loading);
                    self.notifier.warn(REBUFFERING);
                    self.arm_start(start);
                }
                Placement::Continued => {}
            }
            self.output.schedule(buffer, start);
        }
    }

    fn arm_start(&mut self, at: f64) {
        self.cancel_start();
        self.start_task = Some(self.timers.schedule(at, EngineTask::EnterPlaying));
    }

    fn cancel_start(&mut self) {
        if let Some(id) = self.start_task.take() {
            self.timers.cancel(id);
        }
    }

    fn run_task(&mut self, task: EngineTask) {
        match task {
            EngineTask::EnterPlaying => {
                if self.state == PlaybackState::Loading {
                    self.set_state(PlaybackState::Playing);
                }
            }
        }
    }

    fn flush_push(&mut self) {
        if matches!(self.state, PlaybackState::Stopped | PlaybackState::Paused) {
            self.throttle.clear();
            return;
        }
        if self.throttle.poll(self.clock.now()) {
            self.push_active();
        }
    }

    /// Send the active list; returns false if playback had to pause or stop
    fn push_active(&mut self) -> bool {
        if self.session.is_none() {
            if let Err(e) = self.connect() {
                log::error!("Engine: reconnect failed: {}", e);
                self.notifier.error(e.to_string());
                self.stop(StopReason::Error);
                return false;
            }
        }

        let active = self.active_prompts();
        if active.is_empty() {
            self.notifier.warn(NEED_ACTIVE_PROMPT);
            self.pause();
            return false;
        }

        let result = match self.session.as_mut() {
            Some(session) => session.set_weighted_prompts(&active),
            None => Err(SessionError::Closed),
        };
        match result {
            Ok(()) => {
                log::debug!("Engine: pushed {} prompts", active.len());
                self.publish(EngineEvent::PromptsPushed(active));
                true
            }
            Err(e) => {
                log::error!("Engine: prompt push failed: {}", e);
                self.notifier.error(e.to_string());
                self.pause();
                false
            }
        }
    }

    fn connection_lost(&mut self) {
        self.drop_session();
        self.notifier.error(CONNECTION_LOST);
        self.stop(StopReason::Error);
    }

    fn drop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.session_rx = None;
        self.setup_complete = false;
    }

    fn fade_out_and_flush(&mut self, fade: f64) {
        let now = self.clock.now();
        self.output.ramp_gain(0.0, now, now + fade);
        self.output.flush(now + fade);
        self.scheduler.reset();
        self.cancel_start();
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        log::debug!("Engine: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.publish(EngineEvent::StateChanged(state));
    }

    fn publish(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Engine: event receiver dropped");
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.drop_session();
    }
}
