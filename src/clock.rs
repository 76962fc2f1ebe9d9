use std::time::Duration;

use crate::models::Track;

/// Floor for any resync delay, so that a track at (or past) its end never
/// turns the poll loop into a busy loop.
pub const MIN_DELAY: Duration = Duration::from_millis(500);

/// Decides how long to wait before the next now-playing resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    min_delay: Duration,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(MIN_DELAY)
    }
}

impl PlaybackClock {
    pub fn new(min_delay: Duration) -> Self {
        Self { min_delay }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// `max(min_delay, duration - position)`; a position past the end
    /// yields `min_delay`.
    pub fn next_delay(&self, track: &Track, position_ms: u64) -> Duration {
        let remaining = track.duration_ms.saturating_sub(position_ms);
        Duration::from_millis(remaining).max(self.min_delay)
    }
}
