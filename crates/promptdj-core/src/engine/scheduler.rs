//! Lookahead scheduling of decoded chunks
//!
//! Chunks are laid end to end on the output clock. The first chunk after a
//! reset starts `buffer_time` seconds in the future so the buffer can fill.
//! If the next start has already slipped into the past the stream has
//! underrun, and the clock restarts `buffer_time` ahead again.

/// How a chunk was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First chunk after a reset
    Primed,
    /// The clock had fallen behind and was restarted
    Underrun,
    /// Appended after the previous chunk
    Continued,
}

#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    next_start: Option<f64>,
    buffer_time: f64,
}

impl LookaheadScheduler {
    pub fn new(buffer_time: f64) -> Self {
        Self {
            next_start: None,
            buffer_time,
        }
    }

    pub fn buffer_time(&self) -> f64 {
        self.buffer_time
    }

    /// Start time of the next chunk, `None` until a chunk is placed
    pub fn next_start(&self) -> Option<f64> {
        self.next_start
    }

    /// Forget the clock (pause, stop)
    pub fn reset(&mut self) {
        self.next_start = None;
    }

    /// Place a chunk of `duration` seconds; returns its start and how it was
    /// placed
    pub fn place(&mut self, now: f64, duration: f64) -> (f64, Placement) {
        let (start, placement) = match self.next_start {
            None => (now + self.buffer_time, Placement::Primed),
            Some(next) if next < now => (now + self.buffer_time, Placement::Underrun),
            Some(next) => (next, Placement::Continued),
        };
        self.next_start = Some(start + duration);
        (start, placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_laid_end_to_end() {
        let mut scheduler = LookaheadScheduler::new(2.0);
        assert_eq!(scheduler.place(10.0, 1.0), (12.0, Placement::Primed));
        assert_eq!(scheduler.place(10.1, 1.0), (13.0, Placement::Continued));
        assert_eq!(scheduler.place(10.2, 0.5), (14.0, Placement::Continued));
        assert_eq!(scheduler.next_start(), Some(14.5));
    }

    #[test]
    fn test_underrun_restarts_ahead() {
        let mut scheduler = LookaheadScheduler::new(2.0);
        scheduler.place(0.0, 1.0);
        assert_eq!(scheduler.place(3.5, 1.0), (5.5, Placement::Underrun));
        assert_eq!(scheduler.next_start(), Some(6.5));
    }

    #[test]
    fn test_exactly_on_time_is_not_underrun() {
        let mut scheduler = LookaheadScheduler::new(2.0);
        scheduler.place(0.0, 1.0);
        assert_eq!(scheduler.place(3.0, 1.0), (3.0, Placement::Continued));
    }

    #[test]
    fn test_reset() {
        let mut scheduler = LookaheadScheduler::new(2.0);
        scheduler.place(0.0, 1.0);
        scheduler.reset();
        assert_eq!(scheduler.next_start(), None);
        assert_eq!(scheduler.place(1.0, 1.0).1, Placement::Primed);
    }
}
