//! Lock-free CC binding table shared with the input router
//!
//! The store is the only writer. The router reads it from the MIDI side
//! without taking a lock.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::NUM_PROMPTS;

/// CC number bound to each channel, indexed by channel position
#[derive(Debug)]
pub struct BindingTable {
    cc: [AtomicU8; NUM_PROMPTS],
}

impl BindingTable {
    /// Identity bindings (channel `i` on CC `i`)
    pub fn new() -> Self {
        Self {
            cc: std::array::from_fn(|i| AtomicU8::new(i as u8)),
        }
    }

    /// CC bound to the channel at `index`
    pub fn cc(&self, index: usize) -> Option<u8> {
        self.cc.get(index).map(|cc| cc.load(Ordering::Relaxed))
    }

    /// Rebind the channel at `index`
    pub fn set(&self, index: usize, cc: u8) {
        if let Some(slot) = self.cc.get(index) {
            slot.store(cc.min(127), Ordering::Relaxed);
        }
    }

    /// Positions of every channel bound to `cc`
    pub fn channels_for(&self, cc: u8) -> Vec<usize> {
        self.cc
            .iter()
            .enumerate()
            .filter(|(_, bound)| bound.load(Ordering::Relaxed) == cc)
            .map(|(index, _)| index)
            .collect()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}
