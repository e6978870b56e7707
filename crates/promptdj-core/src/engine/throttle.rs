//! Leading + trailing edge throttle for prompt pushes

/// At most one push per interval
///
/// A request with the window open fires on the next poll (leading edge).
/// Requests inside the window coalesce into a single push when it closes
/// (trailing edge). Times are output-clock seconds.
#[derive(Debug, Clone)]
pub struct PushThrottle {
    interval: f64,
    last_push: Option<f64>,
    pending: bool,
}

impl PushThrottle {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval: interval_secs,
            last_push: None,
            pending: false,
        }
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Drop a pending request without touching the window
    pub fn clear(&mut self) {
        self.pending = false;
    }

    /// Record a push made outside [`poll`](Self::poll)
    pub fn mark_pushed(&mut self, now: f64) {
        self.pending = false;
        self.last_push = Some(now);
    }

    /// Whether a pending push should happen now; consumes the window if so
    pub fn poll(&mut self, now: f64) -> bool {
        if !self.pending {
            return false;
        }
        let open = self
            .last_push
            .map_or(true, |last| now - last >= self.interval - 1e-9);
        if open {
            self.mark_pushed(now);
        }
        open
    }
}
