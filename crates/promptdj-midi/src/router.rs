//! CC → channel command routing
//!
//! Bindings are read from the shared [`BindingTable`] the store maintains,
//! so a rebind shows up here as soon as the store commits it. The MIDI
//! channel nibble is not part of a binding: every channel bound to a CC
//! follows it, whatever channel the controller transmits on.

use std::sync::Arc;

use flume::Sender;
use promptdj_core::channels::{channel_id, channel_index, BindingTable, ChannelCommand};

use crate::input::MidiInputEvent;
use crate::normalize::cc_to_weight;

/// Routes parsed MIDI input to channel commands
pub struct InputRouter {
    bindings: Arc<BindingTable>,
    commands: Sender<ChannelCommand>,
    /// Channel waiting for its next CC
    learning: Option<String>,
}

impl InputRouter {
    pub fn new(bindings: Arc<BindingTable>, commands: Sender<ChannelCommand>) -> Self {
        Self {
            bindings,
            commands,
            learning: None,
        }
    }

    /// Bind the next incoming CC to `id`
    ///
    /// Replaces any learn already in progress. Returns `false` for an
    /// unknown channel id.
    pub fn start_learn(&mut self, id: &str) -> bool {
        if channel_index(id).is_none() {
            log::warn!("MIDI: Cannot learn unknown channel '{}'", id);
            return false;
        }
        log::info!("MIDI: Learning control for {}", id);
        self.learning = Some(id.to_string());
        true
    }

    pub fn cancel_learn(&mut self) {
        self.learning = None;
    }

    /// Channel in learn mode, if any
    pub fn learning(&self) -> Option<&str> {
        self.learning.as_deref()
    }

    /// Route one event; returns how many commands were sent
    pub fn handle_midi(&mut self, event: MidiInputEvent) -> usize {
        let MidiInputEvent::ControlChange { cc, value, .. } = event;

        if let Some(id) = self.learning.take() {
            log::info!("MIDI: {} bound to CC {}", id, cc);
            return self.send(ChannelCommand::SetControl { id, cc }) as usize;
        }

        let weight = cc_to_weight(value);
        let mut sent = 0;
        for index in self.bindings.channels_for(cc) {
            let id = channel_id(index);
            if self.send(ChannelCommand::SetWeight { id, weight }) {
                sent += 1;
            }
        }
        sent
    }

    /// Forward a command from another input source
    pub fn send(&self, command: ChannelCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("MIDI: Command dropped, store gone: {:?}", e.into_inner());
                false
            }
        }
    }
}
