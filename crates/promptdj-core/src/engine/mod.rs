//! Playback engine: session lifecycle, lookahead scheduling, underrun
//! recovery and throttled prompt pushes

mod engine;
mod event;
mod scheduler;
mod state;
mod throttle;
mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{
    EngineSettings, PlaybackEngine, CONNECTION_LOST, NEED_ACTIVE_PROMPT, REBUFFERING,
};
pub use event::EngineEvent;
pub use scheduler::{LookaheadScheduler, Placement};
pub use state::{PlaybackState, StopReason};
pub use throttle::PushThrottle;
pub use timer::{TaskId, TaskQueue};
