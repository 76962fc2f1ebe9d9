use crate::models::{NowPlaying, Track};

// Events broadcast to every subscriber of a client
#[derive(Debug, Clone)]
pub enum RadioEvent {
    NowPlayingChanged(NowPlaying),
    QueueChanged(Vec<Track>),
    /// A poll failed; the display fell back to "nothing playing".
    PlaybackUnavailable,
    SearchCompleted { query: String, results: usize },
    SearchFailed { query: String },
    SearchCleared,
    RequestSubmitted(Track),
    SessionResolved { privileged: bool },
}

impl RadioEvent {
    // Get the name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            RadioEvent::NowPlayingChanged(_) => "nowPlayingChanged",
            RadioEvent::QueueChanged(_) => "queueChanged",
            RadioEvent::PlaybackUnavailable => "playbackUnavailable",
            RadioEvent::SearchCompleted { .. } => "searchCompleted",
            RadioEvent::SearchFailed { .. } => "searchFailed",
            RadioEvent::SearchCleared => "searchCleared",
            RadioEvent::RequestSubmitted(_) => "requestSubmitted",
            RadioEvent::SessionResolved { .. } => "sessionResolved",
        }
    }

    /// If this event carries a new now-playing value, returns it
    pub fn now_playing(&self) -> Option<&NowPlaying> {
        match self {
            RadioEvent::NowPlayingChanged(np) => Some(np),
            _ => None,
        }
    }
}
