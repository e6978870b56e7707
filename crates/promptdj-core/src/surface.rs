//! The control surface: one cooperative loop wiring every component
//!
//! ```text
//! input router ─ChannelCommand─▶ ChannelStore ─MixUpdate─▶ PlaybackEngine ─▶ Session
//!                                     │                        ▲      │
//!                               PresetManager        SessionEvent     ▼
//!                                                               OutputGraph
//!                                                               ├─ meter tap ─▶ LevelMeter
//!                                                               └─ recorder tap ─▶ Recorder
//! ```
//!
//! The embedding application calls [`ControlSurface::tick`] from its UI
//! loop (every frame or on a short timer).

use std::sync::Arc;

use flume::{Receiver, Sender};

use crate::channels::{BindingTable, Channel, ChannelCommand, ChannelStore};
use crate::config::SurfaceConfig;
use crate::engine::{EngineEvent, EngineSettings, PlaybackEngine, PlaybackState, StopReason};
use crate::level::LevelMeter;
use crate::notify::{Notice, Notifier};
use crate::output::{output_graph, AudioClock, OutputSink, StreamOutput, TapHandle, TapKind};
use crate::persistence::{FileStorage, Storage};
use crate::presets::{PresetError, PresetManager};
use crate::recorder::{Recorder, RecorderError, RecorderEvent, RECORDER_TAP_CAPACITY};
use crate::session::SessionFactory;

/// Meter tap size in samples
const METER_TAP_CAPACITY: usize = 4096;

/// Errors setting up the surface
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Audio(#[from] crate::output::AudioError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// Injected collaborators
pub struct SurfaceDeps {
    pub factory: Box<dyn SessionFactory>,
    pub clock: Arc<dyn AudioClock>,
    pub output: Box<dyn OutputSink>,
    pub taps: TapHandle,
}

pub struct ControlSurface {
    commands_tx: Sender<ChannelCommand>,
    commands_rx: Receiver<ChannelCommand>,
    store: ChannelStore,
    presets: PresetManager,
    engine: PlaybackEngine,
    engine_events: Receiver<EngineEvent>,
    recorder: Recorder,
    recorder_events: Receiver<RecorderEvent>,
    taps: TapHandle,
    meter: LevelMeter,
    level: f32,
    notifier: Notifier,
}

impl ControlSurface {
    /// Build the surface on the default audio device with file-backed state
    ///
    /// Returns the surface, the running stream (audio stops when it is
    /// dropped) and the notice receiver for the UI.
    pub fn open(
        config: &SurfaceConfig,
        factory: Box<dyn SessionFactory>,
    ) -> Result<(Self, StreamOutput, Receiver<Notice>), SurfaceError> {
        let (handle, taps, graph) = output_graph(config.audio.sample_rate, config.audio.channels);
        let stream = StreamOutput::start(graph, config.audio.sample_rate)?;

        let deps = SurfaceDeps {
            factory,
            clock: Arc::new(handle.clock()),
            output: Box::new(handle),
            taps,
        };
        let storage = FileStorage::new(config.storage_dir());
        let (surface, notices) = Self::new(config, storage, deps)?;
        Ok((surface, stream, notices))
    }

    /// Build the surface from explicit parts
    pub fn new<S>(
        config: &SurfaceConfig,
        storage: S,
        deps: SurfaceDeps,
    ) -> Result<(Self, Receiver<Notice>), SurfaceError>
    where
        S: Storage + Clone + 'static,
    {
        let (notifier, notices) = Notifier::channel(config.notices.duration());
        let (commands_tx, commands_rx) = flume::unbounded();
        let (mix_tx, mix_rx) = flume::unbounded();

        let mut store = ChannelStore::new(
            Box::new(storage.clone()),
            Arc::new(BindingTable::new()),
            mix_tx,
        );
        store.restore();
        let presets = PresetManager::load_from(Box::new(storage));

        let (engine, engine_events) = PlaybackEngine::new(
            EngineSettings::from_config(config),
            deps.factory,
            deps.clock,
            deps.output,
            mix_rx,
            notifier.clone(),
        );

        let (recorder, recorder_events) = Recorder::new(
            &config.recording,
            config.audio.sample_rate,
            config.audio.channels,
            notifier.clone(),
        )?;

        let mut taps = deps.taps;
        let mut meter = LevelMeter::new();
        if let Some(tap) = taps.attach(TapKind::Meter, METER_TAP_CAPACITY) {
            meter.attach(tap);
        }

        log::info!("Surface: ready");
        let surface = Self {
            commands_tx,
            commands_rx,
            store,
            presets,
            engine,
            engine_events,
            recorder,
            recorder_events,
            taps,
            meter,
            level: 0.0,
            notifier,
        };
        Ok((surface, notices))
    }

    /// Sender for channel commands (MIDI router, pointer input, UI edits)
    pub fn command_sender(&self) -> Sender<ChannelCommand> {
        self.commands_tx.clone()
    }

    /// Binding table for the MIDI router
    pub fn bindings(&self) -> Arc<BindingTable> {
        self.store.bindings()
    }

    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Recorder events for the UI
    pub fn recorder_events(&self) -> Receiver<RecorderEvent> {
        self.recorder_events.clone()
    }

    /// Run one pass of the control loop
    pub fn tick(&mut self) {
        self.apply_commands();
        self.engine.tick();

        let events: Vec<EngineEvent> = self.engine_events.try_iter().collect();
        for event in events {
            match event {
                EngineEvent::Stopped {
                    reason: StopReason::Manual,
                } if self.recorder.is_recording() => {
                    self.finish_recording();
                }
                EngineEvent::Stopped {
                    reason: StopReason::Error,
                } if self.recorder.is_recording() => {
                    self.taps.detach(TapKind::Recorder);
                    self.recorder.abort();
                }
                _ => {}
            }
        }

        self.recorder.pump();
        self.recorder.poll();
        self.level = self.meter.update();
    }

    fn apply_commands(&mut self) {
        let commands: Vec<ChannelCommand> = self.commands_rx.try_iter().collect();
        for command in commands {
            if let Err(e) = self.store.apply(command) {
                log::warn!("Surface: rejected channel command: {}", e);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    pub fn play(&mut self) {
        self.apply_commands();
        self.engine.play();
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn stop(&mut self) {
        self.engine.stop(StopReason::Manual);
    }

    pub fn toggle(&mut self) {
        self.apply_commands();
        self.engine.toggle();
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    /// Smoothed output level in `[0, 1]`
    pub fn level(&self) -> f32 {
        self.level
    }

    // ─────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────

    pub fn channels(&self) -> &[Channel] {
        self.store.channels()
    }

    /// Texts the session refused
    pub fn is_filtered(&self, text: &str) -> bool {
        self.engine.filtered().contains(text)
    }

    pub fn reset_channels(&mut self) {
        self.store.reset();
    }

    // ─────────────────────────────────────────────────────────────
    // Recording
    // ─────────────────────────────────────────────────────────────

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn start_recording(&mut self) -> Result<(), RecorderError> {
        let Some(tap) = self.taps.attach(TapKind::Recorder, RECORDER_TAP_CAPACITY) else {
            let e = RecorderError::Encode("could not attach the recorder tap".into());
            self.notifier.error(e.to_string());
            return Err(e);
        };
        match self.recorder.start(tap) {
            Ok(format) => {
                log::info!("Surface: recording as {:?}", format);
                Ok(())
            }
            Err(e) => {
                self.taps.detach(TapKind::Recorder);
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn stop_recording(&mut self) {
        if self.recorder.is_recording() {
            self.finish_recording();
        }
    }

    fn finish_recording(&mut self) {
        self.taps.detach(TapKind::Recorder);
        if let Err(e) = self.recorder.stop() {
            log::error!("Surface: recording failed: {}", e);
            self.notifier.error(e.to_string());
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Presets
    // ─────────────────────────────────────────────────────────────

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    /// The live channels differ from the loaded preset
    pub fn is_modified(&self) -> bool {
        self.presets.is_dirty(self.store.channels())
    }

    pub fn save_preset_as(&mut self, name: &str) -> Result<(), PresetError> {
        let result = self.presets.save_as(name, self.store.channels());
        self.report(result)
    }

    pub fn save_preset(&mut self) -> Result<(), PresetError> {
        let result = self.presets.save(self.store.channels());
        self.report(result)
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let result = self.presets.delete(name);
        self.report(result)
    }

    pub fn load_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let result = self.presets.load(name, &mut self.store);
        self.report(result)
    }

    pub fn toggle_favorite(&mut self, name: &str) -> Result<bool, PresetError> {
        let result = self.presets.toggle_favorite(name);
        self.report(result)
    }

    pub fn export_preset(&self) -> Result<String, PresetError> {
        let result = self.presets.export(self.store.channels());
        self.report(result)
    }

    /// Import a preset file; returns the name it was stored under
    pub fn import_preset(&mut self, json: &str) -> Result<String, PresetError> {
        let result = self.presets.import(json, &mut self.store);
        if let Ok(name) = &result {
            self.notifier.info(format!("Imported preset \"{}\"", name));
        }
        self.report(result)
    }

    fn report<T>(&self, result: Result<T, PresetError>) -> Result<T, PresetError> {
        if let Err(e) = &result {
            log::warn!("Surface: preset operation failed: {}", e);
            self.notifier.error(e.to_string());
        }
        result
    }
}

impl Drop for ControlSurface {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}
