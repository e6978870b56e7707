//! MIDI and pointer input for the PromptDJ control surface
//!
//! This crate provides:
//! - MIDI device discovery and hot-plug via midir
//! - Control Change parsing and CC → weight routing with learn mode
//! - Knob, slider and wheel gesture handling for on-screen controls
//!
//! # Architecture
//!
//! ```text
//! MIDI Device → midir callback → flume → MidiSurface::poll() → ChannelCommand → store
//! Pointer     → MidiSurface::pointer_*()                     → ChannelCommand → store
//! ```
//!
//! The midir callback and the device watcher run on their own threads; all
//! routing happens on the control thread inside [`MidiSurface::poll`].

mod connection;
mod devices;
mod input;
mod normalize;
mod pointer;
mod router;

pub use connection::{list_input_devices, MidiConnectionError};
pub use devices::{DeviceSelection, DeviceWatcher, MidiDevice, SelectionChange, DEVICE_POLL_INTERVAL};
pub use input::{MidiInputEvent, MidiInputHandler};
pub use normalize::{cc_to_weight, normalize_port_name};
pub use pointer::PointerInput;
pub use router::InputRouter;

use std::sync::Arc;

use flume::{Receiver, Sender};
use promptdj_core::channels::{BindingTable, ChannelCommand, ControlStyle};
use promptdj_core::config::InputConfig;
use promptdj_core::notify::Notifier;

/// Notice shown once when the MIDI subsystem cannot start
pub const MIDI_UNAVAILABLE: &str = "MIDI unavailable";

/// Input front end of the control surface
///
/// Owns the device watcher, the live input connection and the gesture
/// state. Every input ends up as a [`ChannelCommand`] on the store's
/// command channel. Without MIDI the surface stays usable through pointer
/// input.
pub struct MidiSurface {
    router: InputRouter,
    pointer: PointerInput,
    selection: DeviceSelection,
    notifier: Notifier,
    /// Device list updates (absent when MIDI is unavailable)
    devices_rx: Option<Receiver<Vec<MidiDevice>>>,
    _watcher: Option<DeviceWatcher>,
    /// Input connection for the active device
    input_handler: Option<MidiInputHandler>,
    event_tx: Sender<MidiInputEvent>,
    event_rx: Receiver<MidiInputEvent>,
}

impl MidiSurface {
    /// Start MIDI input against the system's ports
    pub fn new(
        bindings: Arc<BindingTable>,
        commands: Sender<ChannelCommand>,
        input: InputConfig,
        notifier: Notifier,
    ) -> Self {
        Self::with_lister(bindings, commands, input, notifier, list_input_devices)
    }

    /// Start with a custom port enumerator
    ///
    /// The enumerator runs once up front; if it fails, MIDI is marked
    /// unavailable and no watcher is started.
    pub fn with_lister<F>(
        bindings: Arc<BindingTable>,
        commands: Sender<ChannelCommand>,
        input: InputConfig,
        notifier: Notifier,
        mut list: F,
    ) -> Self
    where
        F: FnMut() -> Result<Vec<MidiDevice>, MidiConnectionError> + Send + 'static,
    {
        let (event_tx, event_rx) = flume::unbounded();
        let mut surface = Self {
            router: InputRouter::new(bindings, commands),
            pointer: PointerInput::new(input),
            selection: DeviceSelection::new(),
            notifier,
            devices_rx: None,
            _watcher: None,
            input_handler: None,
            event_tx,
            event_rx,
        };

        if let Err(e) = list() {
            log::warn!("MIDI: Unavailable: {}", e);
            surface.notifier.warn(MIDI_UNAVAILABLE);
            return surface;
        }

        let watched = move || match list() {
            Ok(devices) => Some(devices),
            Err(e) => {
                log::warn!("MIDI: Port enumeration failed: {}", e);
                None
            }
        };
        match DeviceWatcher::spawn(watched, DEVICE_POLL_INTERVAL) {
            Ok((watcher, devices_rx)) => {
                surface._watcher = Some(watcher);
                surface.devices_rx = Some(devices_rx);
            }
            Err(e) => {
                log::error!("MIDI: Failed to start device watcher: {}", e);
                surface.notifier.warn(MIDI_UNAVAILABLE);
            }
        }
        surface
    }

    /// Whether MIDI input is running
    pub fn is_available(&self) -> bool {
        self.devices_rx.is_some()
    }

    /// Apply device changes and route pending MIDI input
    ///
    /// Call once per control tick. Returns the number of commands sent.
    pub fn poll(&mut self) -> usize {
        let updates: Vec<Vec<MidiDevice>> = match &self.devices_rx {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        for devices in updates {
            if let Some(change) = self.selection.on_devices_changed(devices) {
                self.apply_selection(change);
            }
        }

        let events: Vec<MidiInputEvent> = self.event_rx.try_iter().collect();
        events
            .into_iter()
            .map(|event| self.router.handle_midi(event))
            .sum()
    }

    /// Attached devices as last reported by the watcher
    pub fn devices(&self) -> &[MidiDevice] {
        self.selection.devices()
    }

    /// Id of the device being listened to
    pub fn active_device(&self) -> Option<&str> {
        self.selection.active()
    }

    /// Listen to another device, or to none
    pub fn select_device(&mut self, id: Option<&str>) {
        if let Some(change) = self.selection.select(id) {
            self.apply_selection(change);
        }
    }

    fn apply_selection(&mut self, change: SelectionChange) {
        // Close the old port before opening the next one
        self.input_handler = None;

        match change {
            SelectionChange::Cleared => log::info!("MIDI: No active device"),
            SelectionChange::Selected(device) => {
                match MidiInputHandler::connect(&device.id, self.event_tx.clone()) {
                    Ok(handler) => self.input_handler = Some(handler),
                    Err(e) => {
                        log::error!("MIDI: Failed to open '{}': {}", device.name, e);
                        self.notifier
                            .error(format!("Could not open MIDI device {}", device.name));
                    }
                }
            }
        }
    }

    /// Bind the next CC to `id`
    pub fn start_learn(&mut self, id: &str) -> bool {
        self.router.start_learn(id)
    }

    pub fn cancel_learn(&mut self) {
        self.router.cancel_learn();
    }

    /// Channel in learn mode, if any
    pub fn learning(&self) -> Option<&str> {
        self.router.learning()
    }

    /// Pointer pressed on a channel's control
    pub fn pointer_press(&mut self, id: &str, style: ControlStyle, y: f32, height: f32) {
        if let Some(cmd) = self.pointer.press(id, style, y, height) {
            self.router.send(cmd);
        }
    }

    /// Pointer moved while pressed
    pub fn pointer_move(&mut self, y: f32) {
        if let Some(cmd) = self.pointer.move_to(y) {
            self.router.send(cmd);
        }
    }

    pub fn pointer_release(&mut self) {
        self.pointer.release();
    }

    /// Wheel scrolled over a channel's control
    pub fn wheel(&mut self, id: &str, delta_y: f32) {
        if let Some(cmd) = self.pointer.wheel(id, delta_y) {
            self.router.send(cmd);
        }
    }

    /// Forward an edit from the UI (text, color)
    pub fn send(&self, command: ChannelCommand) {
        self.router.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptdj_core::notify::NoticeKind;
    use std::time::Duration;

    fn surface_with<F>(list: F) -> (MidiSurface, Receiver<ChannelCommand>, Receiver<promptdj_core::notify::Notice>)
    where
        F: FnMut() -> Result<Vec<MidiDevice>, MidiConnectionError> + Send + 'static,
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let (tx, rx) = flume::unbounded();
        let (notifier, notices) = Notifier::channel(Duration::from_millis(500));
        let surface = MidiSurface::with_lister(
            Arc::new(BindingTable::new()),
            tx,
            InputConfig::default(),
            notifier,
            list,
        );
        (surface, rx, notices)
    }

    fn unavailable() -> Result<Vec<MidiDevice>, MidiConnectionError> {
        Err(MidiConnectionError::InputInitError("no backend".into()))
    }

    #[test]
    fn test_unavailable_midi_notifies_once() {
        let (mut surface, _, notices) = surface_with(unavailable);
        surface.poll();
        surface.poll();

        assert!(!surface.is_available());
        let all: Vec<_> = notices.try_iter().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, NoticeKind::Warning);
        assert_eq!(all[0].message, MIDI_UNAVAILABLE);
    }

    #[test]
    fn test_pointer_input_works_without_midi() {
        let (mut surface, commands, _) = surface_with(unavailable);

        surface.pointer_press("prompt-3", ControlStyle::Knob, 100.0, 80.0);
        surface.pointer_move(-50.0);
        surface.pointer_release();
        surface.wheel("prompt-12", 40.0);

        let sent: Vec<ChannelCommand> = commands.try_iter().collect();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            ChannelCommand::NudgeWeight { id, delta } => {
                assert_eq!(id, "prompt-3");
                assert!((delta - 1.5).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&sent[1], ChannelCommand::NudgeWeight { id, .. } if id == "prompt-12"));
    }

    #[test]
    fn test_poll_routes_queued_midi() {
        let (mut surface, commands, _) = surface_with(|| Ok(Vec::new()));
        assert!(surface.is_available());

        surface
            .event_tx
            .send(MidiInputEvent::ControlChange { channel: 0, cc: 7, value: 127 })
            .unwrap();
        assert_eq!(surface.poll(), 1);
        assert_eq!(
            commands.try_recv().unwrap(),
            ChannelCommand::SetWeight { id: "prompt-7".into(), weight: 2.0 }
        );
    }

    #[test]
    fn test_learn_through_surface() {
        let (mut surface, commands, _) = surface_with(|| Ok(Vec::new()));
        assert!(surface.start_learn("prompt-0"));
        surface
            .event_tx
            .send(MidiInputEvent::ControlChange { channel: 4, cc: 70, value: 12 })
            .unwrap();
        surface.poll();

        assert_eq!(
            commands.try_recv().unwrap(),
            ChannelCommand::SetControl { id: "prompt-0".into(), cc: 70 }
        );
        assert_eq!(surface.learning(), None);
    }

    #[test]
    fn test_empty_device_list_selects_nothing() {
        let (mut surface, _, notices) = surface_with(|| Ok(Vec::new()));
        std::thread::sleep(Duration::from_millis(50));
        surface.poll();
        assert_eq!(surface.active_device(), None);
        assert!(surface.devices().is_empty());
        assert!(notices.is_empty());
    }

    mod end_to_end {
        use super::*;
        use promptdj_core::engine::PlaybackState;
        use promptdj_core::output::{output_graph, OutputGraph};
        use promptdj_core::persistence::MemoryStorage;
        use promptdj_core::session::{Session, SessionError, SessionEvent, SessionFactory, WeightedPrompt};
        use promptdj_core::{ControlSurface, SurfaceDeps};
        use std::sync::Mutex;

        type Pushes = Arc<Mutex<Vec<Vec<WeightedPrompt>>>>;

        struct LoggingSession(Pushes);

        impl Session for LoggingSession {
            fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), SessionError> {
                self.0.lock().unwrap().push(prompts.to_vec());
                Ok(())
            }
            fn play(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
            fn pause(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
            fn stop(&mut self) -> Result<(), SessionError> {
                Ok(())
            }
            fn close(&mut self) {}
        }

        struct LoggingFactory(Pushes);

        impl SessionFactory for LoggingFactory {
            fn connect(
                &mut self,
                _model: &str,
                _events: Sender<SessionEvent>,
            ) -> Result<Box<dyn Session>, SessionError> {
                Ok(Box::new(LoggingSession(self.0.clone())))
            }
        }

        fn control_surface() -> (ControlSurface, Pushes, OutputGraph) {
            let pushes = Pushes::default();
            let (handle, taps, graph) = output_graph(48000, 2);
            let deps = SurfaceDeps {
                factory: Box::new(LoggingFactory(pushes.clone())),
                clock: Arc::new(handle.clock()),
                output: Box::new(handle),
                taps,
            };
            let config = promptdj_core::config::SurfaceConfig::default();
            let (surface, _notices) = ControlSurface::new(&config, MemoryStorage::default(), deps).unwrap();
            (surface, pushes, graph)
        }

        #[test]
        fn test_knob_drag_reaches_session() {
            let (mut surface, pushes, _graph) = control_surface();
            let mut input = MidiSurface::with_lister(
                surface.bindings(),
                surface.command_sender(),
                InputConfig::default(),
                surface.notifier(),
                unavailable,
            );

            // 150 px upward on a knob
            input.pointer_press("prompt-3", ControlStyle::Knob, 200.0, 80.0);
            input.pointer_move(50.0);
            input.pointer_release();
            surface.play();

            assert_eq!(surface.state(), PlaybackState::Loading);
            assert!((surface.channels()[3].weight - 1.5).abs() < 1e-6);
            let pushes = pushes.lock().unwrap();
            assert_eq!(pushes.len(), 1);
            assert_eq!(pushes[0].len(), 1);
            assert_eq!(pushes[0][0].text, "Post Punk");
            assert!((pushes[0][0].weight - 1.5).abs() < 1e-6);
        }

        #[test]
        fn test_slider_press_then_tick_updates_store() {
            let (mut surface, _, _graph) = control_surface();
            let mut input = MidiSurface::with_lister(
                surface.bindings(),
                surface.command_sender(),
                InputConfig::default(),
                surface.notifier(),
                unavailable,
            );

            input.pointer_press("prompt-5", ControlStyle::Slider, 20.0, 80.0);
            input.pointer_release();
            surface.tick();

            assert!((surface.channels()[5].weight - 1.5).abs() < 1e-6);
            assert_eq!(surface.state(), PlaybackState::Stopped);
        }
    }
}
