//! Preset list management
//!
//! Presets are kept as a JSON array under [`PRESETS_KEY`] and rewritten on
//! every change. Loading a preset replaces the live channel set through the
//! [`ChannelStore`], which also clears the filtered-prompt set.

use serde::{Deserialize, Serialize};

use super::exchange::{export_json, parse_import};
use super::PresetError;
use crate::channels::{arrange, Channel, ChannelStore};
use crate::persistence::{Storage, PRESETS_KEY};

/// Weights closer than this count as unchanged
pub const WEIGHT_EPSILON: f32 = 1e-3;

/// Name used for imports that carry none
const IMPORTED_NAME: &str = "Imported";

/// A named snapshot of all sixteen channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub prompts: Vec<Channel>,
    #[serde(default)]
    pub favorite: bool,
}

/// Owns the preset list and tracks which preset is active
pub struct PresetManager {
    presets: Vec<Preset>,
    active: Option<String>,
    storage: Box<dyn Storage>,
}

impl PresetManager {
    /// Load the preset list from storage (invalid or absent → empty)
    pub fn load_from(storage: Box<dyn Storage>) -> Self {
        let presets = match storage.load(PRESETS_KEY) {
            Ok(Some(blob)) => serde_json::from_str::<Vec<Preset>>(&blob).unwrap_or_else(|e| {
                log::warn!("Presets: stored list is invalid ({}), starting empty", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Presets: failed to read list: {}", e);
                Vec::new()
            }
        };
        log::info!("Presets: loaded {} presets", presets.len());

        Self {
            presets,
            active: None,
            storage,
        }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Name of the loaded preset
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Store the live channels as a new preset and make it active
    pub fn save_as(&mut self, name: &str, channels: &[Channel]) -> Result<(), PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        if self.get(name).is_some() {
            return Err(PresetError::DuplicateName(name.to_string()));
        }

        self.presets.push(Preset {
            name: name.to_string(),
            prompts: channels.to_vec(),
            favorite: false,
        });
        self.active = Some(name.to_string());
        log::info!("Presets: saved new preset {:?}", name);
        self.persist()
    }

    /// Overwrite the active preset with the live channels
    pub fn save(&mut self, channels: &[Channel]) -> Result<(), PresetError> {
        let name = self.active.clone().ok_or(PresetError::NoActivePreset)?;
        let preset = self
            .presets
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PresetError::NotFound(name.clone()))?;
        preset.prompts = channels.to_vec();
        log::info!("Presets: updated {:?}", name);
        self.persist()
    }

    pub fn delete(&mut self, name: &str) -> Result<(), PresetError> {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        if self.presets.len() == before {
            return Err(PresetError::NotFound(name.to_string()));
        }
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        log::info!("Presets: deleted {:?}", name);
        self.persist()
    }

    /// Replace the live channels with a preset and make it active
    pub fn load(&mut self, name: &str, store: &mut ChannelStore) -> Result<(), PresetError> {
        let preset = self
            .get(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;
        store.replace_all(&preset.prompts);
        self.active = Some(name.to_string());
        log::info!("Presets: loaded {:?}", name);
        Ok(())
    }

    /// Flip the favorite flag, returning the new value
    pub fn toggle_favorite(&mut self, name: &str) -> Result<bool, PresetError> {
        let preset = self
            .presets
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;
        preset.favorite = !preset.favorite;
        let favorite = preset.favorite;
        self.persist()?;
        Ok(favorite)
    }

    /// Whether the live channels differ from the active preset
    ///
    /// Weights compare within [`WEIGHT_EPSILON`]; text, cc and color must
    /// match exactly. With no active preset nothing is "modified".
    pub fn is_dirty(&self, channels: &[Channel]) -> bool {
        let Some(preset) = self.active.as_deref().and_then(|name| self.get(name)) else {
            return false;
        };
        let saved = arrange(&preset.prompts);
        saved.len() != channels.len()
            || saved.iter().zip(channels).any(|(a, b)| {
                (a.weight - b.weight).abs() >= WEIGHT_EPSILON
                    || a.text != b.text
                    || a.cc != b.cc
                    || a.color != b.color
            })
    }

    /// Export the live channels, named after the active preset if any
    pub fn export(&self, channels: &[Channel]) -> Result<String, PresetError> {
        let name = self.active.as_deref().unwrap_or("PromptDJ");
        Ok(export_json(name, channels)?)
    }

    /// Import a preset file as a new preset and load it
    ///
    /// Returns the name the preset was stored under.
    pub fn import(&mut self, json: &str, store: &mut ChannelStore) -> Result<String, PresetError> {
        let imported = parse_import(json)?;
        let base = imported.name.unwrap_or_else(|| IMPORTED_NAME.to_string());
        let name = self.unique_name(&base);

        self.presets.push(Preset {
            name: name.clone(),
            prompts: arrange(&imported.prompts),
            favorite: false,
        });
        self.persist()?;
        self.load(&name, store)?;
        log::info!("Presets: imported {:?}", name);
        Ok(name)
    }

    /// `base`, or `base (2)`, `base (3)`, ... whichever is free
    fn unique_name(&self, base: &str) -> String {
        let base = base.trim();
        if self.get(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} ({})", base, n))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn persist(&mut self) -> Result<(), PresetError> {
        let blob = serde_json::to_string(&self.presets)?;
        if let Err(e) = self.storage.store(PRESETS_KEY, &blob) {
            log::error!("Presets: failed to persist list: {}", e);
        }
        Ok(())
    }
}
