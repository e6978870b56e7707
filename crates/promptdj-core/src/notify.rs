//! Transient user notifications
//!
//! Every user-facing error or status message in the surface becomes a
//! [`Notice`] with a bounded display duration. Components hold a cloned
//! [`Notifier`] and never block on the UI.

use std::time::Duration;

use flume::{Receiver, Sender};

/// Default display duration for notices
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(4000);

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// How long the UI should keep it visible
    pub duration: Duration,
}

/// Sending side of the notice channel
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<Notice>,
    duration: Duration,
}

impl Notifier {
    /// Create a notifier and the receiver the UI drains
    pub fn channel(duration: Duration) -> (Self, Receiver<Notice>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx, duration }, rx)
    }

    /// A notifier whose notices go nowhere (receiver dropped)
    pub fn disconnected() -> Self {
        let (notifier, _rx) = Self::channel(DEFAULT_NOTICE_DURATION);
        notifier
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(NoticeKind::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.send(NoticeKind::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(NoticeKind::Error, message.into());
    }

    fn send(&self, kind: NoticeKind, message: String) {
        log::debug!("Notice ({:?}): {}", kind, message);
        // UI may have gone away; notices are best effort
        let _ = self.tx.send(Notice {
            kind,
            message,
            duration: self.duration,
        });
    }
}
