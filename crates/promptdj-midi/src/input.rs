//! MIDI input handling
//!
//! The midir callback runs on a backend thread. It parses Control Change
//! messages and forwards them over a flume channel; routing happens on the
//! control thread in [`crate::InputRouter`].

use flume::Sender;
use midir::MidiInputConnection;

use crate::connection::{find_input_port, open_input, MidiConnectionError};

/// Client name for the live input connection
const INPUT_CLIENT: &str = "promptdj-midi-input";

/// A parsed MIDI input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiInputEvent {
    /// Control Change message
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiInputEvent {
    /// Parse raw MIDI bytes
    ///
    /// Only Control Change (`0xBn cc vv`) is recognized. Notes, pitch bend,
    /// SysEx and truncated messages yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        match (status & 0xF0, rest) {
            (0xB0, [cc, value, ..]) => Some(Self::ControlChange {
                channel: status & 0x0F,
                cc: *cc,
                value: *value,
            }),
            _ => None,
        }
    }

    /// MIDI channel (0-15)
    pub fn channel(&self) -> u8 {
        match self {
            Self::ControlChange { channel, .. } => *channel,
        }
    }
}

/// Callback data passed to midir
struct CallbackData {
    event_tx: Sender<MidiInputEvent>,
}

/// Live connection to one input device
///
/// Dropping the handler closes the port.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<CallbackData>,
    device_id: String,
    port_name: String,
}

impl MidiInputHandler {
    /// Connect to the device with normalized name `device_id`
    pub fn connect(
        device_id: &str,
        event_tx: Sender<MidiInputEvent>,
    ) -> Result<Self, MidiConnectionError> {
        let midi_in = open_input(INPUT_CLIENT)?;
        let (port, port_name) = find_input_port(&midi_in, device_id)?;

        let connection = midi_in
            .connect(
                &port,
                INPUT_CLIENT,
                Self::midi_callback,
                CallbackData { event_tx },
            )
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Listening on '{}'", port_name);

        Ok(Self {
            _connection: connection,
            device_id: device_id.to_string(),
            port_name,
        })
    }

    /// Normalized id of the connected device
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Port name as reported by the backend
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn midi_callback(_timestamp: u64, data: &[u8], cb: &mut CallbackData) {
        let Some(event) = MidiInputEvent::parse(data) else {
            return;
        };
        log::trace!("MIDI: {:?}", event);
        // Receiver gone means the surface is shutting down
        let _ = cb.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        assert_eq!(
            MidiInputEvent::parse(&[0xB3, 7, 100]),
            Some(MidiInputEvent::ControlChange { channel: 3, cc: 7, value: 100 })
        );
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        assert_eq!(MidiInputEvent::parse(&[0x90, 60, 127]), None);
        assert_eq!(MidiInputEvent::parse(&[0x80, 60, 0]), None);
        assert_eq!(MidiInputEvent::parse(&[0xE0, 0, 64]), None);
        assert_eq!(MidiInputEvent::parse(&[0xF0, 0x7E, 0xF7]), None);
    }

    #[test]
    fn test_parse_rejects_truncated() {
        assert_eq!(MidiInputEvent::parse(&[]), None);
        assert_eq!(MidiInputEvent::parse(&[0xB0]), None);
        assert_eq!(MidiInputEvent::parse(&[0xB0, 1]), None);
    }

    #[test]
    fn test_callback_forwards_parsed_events() {
        let (tx, rx) = flume::unbounded();
        let mut data = CallbackData { event_tx: tx };
        MidiInputHandler::midi_callback(0, &[0x90, 60, 127], &mut data);
        MidiInputHandler::midi_callback(0, &[0xB0, 2, 64], &mut data);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![MidiInputEvent::ControlChange { channel: 0, cc: 2, value: 64 }]
        );
    }
}
