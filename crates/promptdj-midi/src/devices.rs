//! Device list tracking and hot-plug
//!
//! midir has no hot-plug notification, so [`DeviceWatcher`] polls the port
//! list on its own thread and publishes the list whenever it changes.
//! [`DeviceSelection`] decides which device the surface listens to.

use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};

/// How often the watcher re-enumerates ports
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// An attached MIDI input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDevice {
    /// Stable id (normalized port name)
    pub id: String,
    /// Name as reported by the backend
    pub name: String,
}

/// Outcome of a selection update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// Start listening to this device
    Selected(MidiDevice),
    /// Stop listening; no device is active
    Cleared,
}

/// Known devices and the active one
#[derive(Debug, Default)]
pub struct DeviceSelection {
    devices: Vec<MidiDevice>,
    active: Option<String>,
}

impl DeviceSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[MidiDevice] {
        &self.devices
    }

    /// Id of the active device
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Apply a fresh device list
    ///
    /// If the active device vanished, the first remaining device takes over
    /// (or none). If nothing was active and a device appeared, it is
    /// selected.
    pub fn on_devices_changed(&mut self, devices: Vec<MidiDevice>) -> Option<SelectionChange> {
        let appeared: Vec<MidiDevice> = devices
            .iter()
            .filter(|d| !self.devices.iter().any(|known| known.id == d.id))
            .cloned()
            .collect();
        self.devices = devices;

        match self.active.clone() {
            Some(active) if self.devices.iter().any(|d| d.id == active) => None,
            Some(active) => {
                log::info!("MIDI: Device '{}' disconnected", active);
                match self.devices.first().cloned() {
                    Some(next) => Some(self.activate(next)),
                    None => {
                        self.active = None;
                        Some(SelectionChange::Cleared)
                    }
                }
            }
            None => appeared.into_iter().next().map(|device| self.activate(device)),
        }
    }

    /// Explicit user selection; `None` deselects
    ///
    /// Returns `None` when the id is unknown or already active.
    pub fn select(&mut self, id: Option<&str>) -> Option<SelectionChange> {
        match id {
            None if self.active.is_some() => {
                self.active = None;
                Some(SelectionChange::Cleared)
            }
            None => None,
            Some(id) if self.active.as_deref() == Some(id) => None,
            Some(id) => {
                let device = self.devices.iter().find(|d| d.id == id).cloned();
                match device {
                    Some(device) => Some(self.activate(device)),
                    None => {
                        log::warn!("MIDI: Unknown device '{}'", id);
                        None
                    }
                }
            }
        }
    }

    fn activate(&mut self, device: MidiDevice) -> SelectionChange {
        self.active = Some(device.id.clone());
        SelectionChange::Selected(device)
    }
}

/// Background port poller
///
/// Publishes the device list once at startup and again on every change.
/// Dropping the watcher stops the thread.
pub struct DeviceWatcher {
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceWatcher {
    /// Spawn a watcher around `list`
    ///
    /// `list` returns `None` when enumeration fails; that poll is skipped.
    pub fn spawn<F>(
        mut list: F,
        interval: Duration,
    ) -> std::io::Result<(Self, Receiver<Vec<MidiDevice>>)>
    where
        F: FnMut() -> Option<Vec<MidiDevice>> + Send + 'static,
    {
        let (devices_tx, devices_rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name("midi-device-watcher".into())
            .spawn(move || {
                let mut last: Option<Vec<MidiDevice>> = None;
                loop {
                    if let Some(devices) = list() {
                        if last.as_ref() != Some(&devices) {
                            log::debug!("MIDI: {} input device(s)", devices.len());
                            if devices_tx.send(devices.clone()).is_err() {
                                break;
                            }
                            last = Some(devices);
                        }
                    }
                    match shutdown_rx.recv_timeout(interval) {
                        Err(flume::RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                log::debug!("MIDI: Device watcher stopped");
            })?;

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
                thread: Some(thread),
            },
            devices_rx,
        ))
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread with Disconnected
        self.shutdown_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
