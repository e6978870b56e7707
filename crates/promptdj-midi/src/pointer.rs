//! Pointer and wheel gestures
//!
//! Turns drags on the on-screen knobs and sliders into weight commands.
//! Vertical motion drives both styles (up increases). Sliders also jump to
//! the click position on press. Clamping to `[0, 2]` is left to the store.

use promptdj_core::channels::{ChannelCommand, ControlStyle, MAX_WEIGHT};
use promptdj_core::config::InputConfig;

/// Drag in progress
#[derive(Debug, Clone)]
struct Drag {
    id: String,
    style: ControlStyle,
    last_y: f32,
}

/// Gesture state for the whole surface
///
/// At most one control is dragged at a time; it keeps receiving motion
/// until release even when the pointer leaves it.
#[derive(Debug)]
pub struct PointerInput {
    sensitivity: InputConfig,
    drag: Option<Drag>,
}

impl PointerInput {
    pub fn new(sensitivity: InputConfig) -> Self {
        Self {
            sensitivity,
            drag: None,
        }
    }

    /// Channel currently being dragged
    pub fn dragging(&self) -> Option<&str> {
        self.drag.as_ref().map(|d| d.id.as_str())
    }

    /// Pointer pressed on a control
    ///
    /// `y` is measured from the top of the control, `height` is its track
    /// length. Sliders jump to `(1 - y / height) * 2`.
    pub fn press(
        &mut self,
        id: &str,
        style: ControlStyle,
        y: f32,
        height: f32,
    ) -> Option<ChannelCommand> {
        self.drag = Some(Drag {
            id: id.to_string(),
            style,
            last_y: y,
        });

        match style {
            ControlStyle::Slider if height > 0.0 && y.is_finite() => {
                let position = (y / height).clamp(0.0, 1.0);
                Some(ChannelCommand::SetWeight {
                    id: id.to_string(),
                    weight: (1.0 - position) * MAX_WEIGHT,
                })
            }
            _ => None,
        }
    }

    /// Pointer moved to `y` (same coordinate space as the press)
    pub fn move_to(&mut self, y: f32) -> Option<ChannelCommand> {
        let drag = self.drag.as_mut()?;
        // Inverted: up = positive
        let delta_y = drag.last_y - y;
        drag.last_y = y;
        if delta_y == 0.0 || !delta_y.is_finite() {
            return None;
        }

        let per_pixel = match drag.style {
            ControlStyle::Knob => self.sensitivity.knob_sensitivity,
            ControlStyle::Slider => self.sensitivity.slider_sensitivity,
        };
        Some(ChannelCommand::NudgeWeight {
            id: drag.id.clone(),
            delta: delta_y * per_pixel,
        })
    }

    /// Pointer released anywhere
    pub fn release(&mut self) {
        self.drag = None;
    }

    /// Scroll over a control; positive `delta_y` scrolls down (decreases)
    pub fn wheel(&self, id: &str, delta_y: f32) -> Option<ChannelCommand> {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return None;
        }
        Some(ChannelCommand::NudgeWeight {
            id: id.to_string(),
            delta: -delta_y * self.sensitivity.wheel_sensitivity,
        })
    }
}

impl Default for PointerInput {
    fn default() -> Self {
        Self::new(InputConfig::default())
    }
}
