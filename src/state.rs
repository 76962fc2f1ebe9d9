use std::time::Duration;

/// Lifecycle of the now-playing poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// A fetch against the playback service is in flight.
    Polling,
    /// Waiting for the single pending resync timer.
    Scheduled { delay: Duration },
}

impl SyncState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SyncState::Idle)
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, SyncState::Scheduled { .. })
    }
}
