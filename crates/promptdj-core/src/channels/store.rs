//! The authoritative channel store

use std::sync::Arc;

use flume::Sender;

use super::{
    arrange, channel_index, clamp_weight, default_channels, BindingTable, Channel, ChannelCommand,
    ChannelError, MixUpdate,
};
use crate::persistence::{Storage, ACTIVE_PROMPTS_KEY};

/// Owns the sixteen channels
///
/// Every successful mutation is persisted under [`ACTIVE_PROMPTS_KEY`],
/// mirrored into the binding table and published as a [`MixUpdate`].
pub struct ChannelStore {
    channels: Vec<Channel>,
    storage: Box<dyn Storage>,
    bindings: Arc<BindingTable>,
    mix_tx: Sender<MixUpdate>,
}

impl ChannelStore {
    /// Create a store holding the stock channels
    ///
    /// Nothing is persisted or published until [`restore`](Self::restore)
    /// or the first mutation.
    pub fn new(
        storage: Box<dyn Storage>,
        bindings: Arc<BindingTable>,
        mix_tx: Sender<MixUpdate>,
    ) -> Self {
        Self {
            channels: default_channels(),
            storage,
            bindings,
            mix_tx,
        }
    }

    /// Load the last persisted snapshot, falling back to the stock channels
    pub fn restore(&mut self) {
        let restored = match self.storage.load(ACTIVE_PROMPTS_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<Channel>>(&blob) {
                Ok(entries) => {
                    log::info!("Channels: restored {} entries", entries.len());
                    arrange(&entries)
                }
                Err(e) => {
                    log::warn!("Channels: stored snapshot is invalid ({}), using defaults", e);
                    default_channels()
                }
            },
            Ok(None) => {
                log::info!("Channels: no stored snapshot, using defaults");
                default_channels()
            }
            Err(e) => {
                log::warn!("Channels: failed to read snapshot: {}", e);
                default_channels()
            }
        };
        self.channels = restored;
        self.commit(true);
    }

    /// Current channels in slot order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Shared binding table (read by the input router)
    pub fn bindings(&self) -> Arc<BindingTable> {
        Arc::clone(&self.bindings)
    }

    /// Apply a single command
    ///
    /// Returns `Ok(true)` if the channel changed. A no-op command (same
    /// value) is accepted but neither persisted nor published.
    pub fn apply(&mut self, command: ChannelCommand) -> Result<bool, ChannelError> {
        let index = channel_index(command.id())
            .ok_or_else(|| ChannelError::UnknownChannel(command.id().to_string()))?;
        let channel = &mut self.channels[index];

        let changed = match command {
            ChannelCommand::SetWeight { id, weight } => {
                let weight = clamp_weight(weight)
                    .ok_or(ChannelError::InvalidWeight { id, value: weight })?;
                replace(&mut channel.weight, weight)
            }
            ChannelCommand::NudgeWeight { id, delta } => {
                let weight = clamp_weight(channel.weight + delta)
                    .ok_or(ChannelError::InvalidWeight { id, value: delta })?;
                replace(&mut channel.weight, weight)
            }
            ChannelCommand::SetControl { cc, .. } => {
                if cc > 127 {
                    return Err(ChannelError::InvalidControl(cc));
                }
                replace(&mut channel.cc, cc)
            }
            ChannelCommand::SetText { id, text } => {
                if text.trim().is_empty() {
                    return Err(ChannelError::EmptyText(id));
                }
                replace(&mut channel.text, text)
            }
            ChannelCommand::SetColor { color, .. } => replace(&mut channel.color, color),
        };

        if changed {
            self.commit(false);
        }
        Ok(changed)
    }

    /// Replace every channel (preset load, import)
    pub fn replace_all(&mut self, entries: &[Channel]) {
        self.channels = arrange(entries);
        self.commit(true);
    }

    /// Back to the stock channels
    pub fn reset(&mut self) {
        log::info!("Channels: reset to defaults");
        self.channels = default_channels();
        self.commit(true);
    }

    fn commit(&mut self, clear_filtered: bool) {
        for (index, channel) in self.channels.iter().enumerate() {
            self.bindings.set(index, channel.cc);
        }

        match serde_json::to_string(&self.channels) {
            Ok(blob) => {
                if let Err(e) = self.storage.store(ACTIVE_PROMPTS_KEY, &blob) {
                    log::error!("Channels: failed to persist snapshot: {}", e);
                }
            }
            Err(e) => log::error!("Channels: failed to serialize snapshot: {}", e),
        }

        let update = MixUpdate {
            prompts: self.channels.clone(),
            clear_filtered,
        };
        if self.mix_tx.send(update).is_err() {
            log::debug!("Channels: mix receiver dropped");
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
