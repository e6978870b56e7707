//! MIDI port discovery
//!
//! Every query opens a short-lived [`MidiInput`] client; midir clients are
//! cheap and holding one open would keep a stale port list on some backends.

use midir::{MidiInput, MidiInputPort};

use crate::devices::MidiDevice;
use crate::normalize::normalize_port_name;

/// Client name used for discovery queries
const DISCOVERY_CLIENT: &str = "promptdj-midi-discovery";

/// MIDI connection errors
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// Open a MIDI input client
pub(crate) fn open_input(client_name: &str) -> Result<MidiInput, MidiConnectionError> {
    MidiInput::new(client_name).map_err(|e| MidiConnectionError::InputInitError(e.to_string()))
}

/// List the input devices currently attached
///
/// Ports whose name cannot be read are skipped. Two ports that normalize to
/// the same id are listed once.
pub fn list_input_devices() -> Result<Vec<MidiDevice>, MidiConnectionError> {
    let midi_in = open_input(DISCOVERY_CLIENT)?;
    Ok(devices_of(&midi_in))
}

pub(crate) fn devices_of(midi_in: &MidiInput) -> Vec<MidiDevice> {
    let mut devices: Vec<MidiDevice> = Vec::new();
    for port in midi_in.ports() {
        match midi_in.port_name(&port) {
            Ok(name) => {
                let id = normalize_port_name(&name);
                if !devices.iter().any(|d| d.id == id) {
                    devices.push(MidiDevice { id, name });
                }
            }
            Err(e) => log::warn!("MIDI: Skipping unreadable port: {}", e),
        }
    }
    devices
}

/// Find the input port whose normalized name equals `device_id`
pub(crate) fn find_input_port(
    midi_in: &MidiInput,
    device_id: &str,
) -> Result<(MidiInputPort, String), MidiConnectionError> {
    for port in midi_in.ports() {
        let name = midi_in
            .port_name(&port)
            .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;
        if normalize_port_name(&name) == device_id {
            log::info!("MIDI: Found input port '{}'", name);
            return Ok((port, name));
        }
    }
    Err(MidiConnectionError::PortNotFound(device_id.to_string()))
}
