//! Channel data model and the stock prompt set

use serde::{Deserialize, Serialize};

use crate::types::NUM_PROMPTS;

/// Lowest allowed weight (inactive)
pub const MIN_WEIGHT: f32 = 0.0;

/// Highest allowed weight
pub const MAX_WEIGHT: f32 = 2.0;

/// Stock prompt texts and colors, in channel order
pub const DEFAULT_PROMPTS: [(&str, &str); NUM_PROMPTS] = [
    ("Bossa Nova", "#9900ff"),
    ("Chillwave", "#5200ff"),
    ("Drum and Bass", "#ff25f6"),
    ("Post Punk", "#2af6de"),
    ("Shoegaze", "#ffdd28"),
    ("Funk", "#2af6de"),
    ("Chiptune", "#9900ff"),
    ("Lush Strings", "#3dffab"),
    ("Sparkling Arpeggios", "#d8ff3e"),
    ("Staccato Rhythms", "#d9b2ff"),
    ("Punchy Kick", "#3dffab"),
    ("Dubstep", "#ffdd28"),
    ("K Pop", "#ff25f6"),
    ("Neo Soul", "#d8ff3e"),
    ("Trip Hop", "#5200ff"),
    ("Thrash", "#d9b2ff"),
];

/// Stable identifier of the channel at `index`
pub fn channel_id(index: usize) -> String {
    format!("prompt-{}", index)
}

/// Index of a channel id, if it names one of the sixteen channels
pub fn channel_index(id: &str) -> Option<usize> {
    id.strip_prefix("prompt-")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|&i| i < NUM_PROMPTS && channel_id(i) == id)
}

/// Clamp a weight into `[0, 2]`, rejecting NaN and infinities
pub fn clamp_weight(weight: f32) -> Option<f32> {
    weight
        .is_finite()
        .then(|| weight.clamp(MIN_WEIGHT, MAX_WEIGHT))
}

/// How a channel is rendered and dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStyle {
    Knob,
    Slider,
}

impl ControlStyle {
    /// Channels 0-7 are knobs, 8-15 sliders
    pub fn for_index(index: usize) -> Self {
        if index < NUM_PROMPTS / 2 {
            ControlStyle::Knob
        } else {
            ControlStyle::Slider
        }
    }
}

/// One prompt channel
///
/// Serialized as `{promptId, text, weight, cc, color}`, the same shape used
/// for the persisted snapshot, presets and exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "promptId")]
    pub id: String,
    pub text: String,
    pub weight: f32,
    pub cc: u8,
    pub color: String,
}

impl Channel {
    /// Stock channel at `index`, weight 0
    pub fn default_at(index: usize) -> Self {
        let (text, color) = DEFAULT_PROMPTS[index % NUM_PROMPTS];
        Self {
            id: channel_id(index),
            text: text.to_string(),
            weight: 0.0,
            cc: index as u8,
            color: color.to_string(),
        }
    }

    /// Contributes to the mix (ignoring the filtered set)
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }
}

/// The sixteen stock channels
pub fn default_channels() -> Vec<Channel> {
    (0..NUM_PROMPTS).map(Channel::default_at).collect()
}

/// Lay arbitrary entries out onto the sixteen slots
///
/// Each slot takes the entry carrying its id; otherwise the entry at the
/// same position if that entry's id names no slot; otherwise the stock
/// channel at weight 0. Slot ids are always the canonical ones, weights are
/// clamped, and empty texts fall back to the stock text.
pub fn arrange(entries: &[Channel]) -> Vec<Channel> {
    (0..NUM_PROMPTS)
        .map(|index| {
            let id = channel_id(index);
            let by_id = entries.iter().find(|e| e.id == id);
            let by_position = entries
                .get(index)
                .filter(|e| channel_index(&e.id).is_none());

            match by_id.or(by_position) {
                Some(entry) => sanitize(entry, index),
                None => Channel::default_at(index),
            }
        })
        .collect()
}

fn sanitize(entry: &Channel, index: usize) -> Channel {
    let stock = Channel::default_at(index);
    let text = entry.text.trim();
    Channel {
        id: stock.id,
        text: if text.is_empty() {
            stock.text
        } else {
            entry.text.clone()
        },
        weight: clamp_weight(entry.weight).unwrap_or(0.0),
        cc: entry.cc.min(127),
        color: entry.color.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let channels = default_channels();
        assert_eq!(channels.len(), 16);
        assert_eq!(channels[0].id, "prompt-0");
        assert_eq!(channels[0].text, "Bossa Nova");
        assert_eq!(channels[15].text, "Thrash");
        assert_eq!(channels[15].cc, 15);
        assert!(channels.iter().all(|c| c.weight == 0.0));
    }

    #[test]
    fn test_channel_index() {
        assert_eq!(channel_index("prompt-0"), Some(0));
        assert_eq!(channel_index("prompt-15"), Some(15));
        assert_eq!(channel_index("prompt-16"), None);
        assert_eq!(channel_index("prompt-03"), None);
        assert_eq!(channel_index("other"), None);
    }

    #[test]
    fn test_styles() {
        assert_eq!(ControlStyle::for_index(0), ControlStyle::Knob);
        assert_eq!(ControlStyle::for_index(7), ControlStyle::Knob);
        assert_eq!(ControlStyle::for_index(8), ControlStyle::Slider);
        assert_eq!(ControlStyle::for_index(15), ControlStyle::Slider);
    }

    #[test]
    fn test_clamp_weight() {
        assert_eq!(clamp_weight(3.0), Some(2.0));
        assert_eq!(clamp_weight(-0.5), Some(0.0));
        assert_eq!(clamp_weight(1.25), Some(1.25));
        assert_eq!(clamp_weight(f32::NAN), None);
        assert_eq!(clamp_weight(f32::INFINITY), None);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Channel::default_at(3)).unwrap();
        assert_eq!(json["promptId"], "prompt-3");
        assert_eq!(json["text"], "Post Punk");
        assert_eq!(json["cc"], 3);
    }

    #[test]
    fn test_arrange_by_id_then_position() {
        let mut moved = Channel::default_at(5);
        moved.text = "Moved".into();
        moved.weight = 1.0;

        let mut legacy = Channel::default_at(0);
        legacy.id = "legacy-a".into();
        legacy.text = "Legacy".into();
        legacy.weight = 5.0;

        // moved sits at position 0 but carries id prompt-5
        let arranged = arrange(&[moved, legacy]);

        assert_eq!(arranged[5].text, "Moved");
        assert_eq!(arranged[5].weight, 1.0);
        // position 1 has an unknown id, so it lands positionally (clamped)
        assert_eq!(arranged[1].id, "prompt-1");
        assert_eq!(arranged[1].text, "Legacy");
        assert_eq!(arranged[1].weight, 2.0);
        // position 0 held an entry for another slot: stock
        assert_eq!(arranged[0], Channel::default_at(0));
        assert_eq!(arranged[15], Channel::default_at(15));
    }
}
