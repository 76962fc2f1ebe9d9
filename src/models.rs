use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::utils::wire;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// A song as the radio service describes it. Never patched in place: every
/// response replaces the previous copy wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(alias = "songId")]
    pub track_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "wire::artists")]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub cover_url: String,
    #[serde(default, deserialize_with = "wire::lenient_millis")]
    pub duration_ms: u64,
    #[serde(default)]
    pub votes: u64,
}

impl Track {
    /// Placeholder used whenever no playback data is available.
    pub fn sentinel() -> Self {
        Track::default()
    }

    pub fn is_sentinel(&self) -> bool {
        self.track_id.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Artist names joined for display, e.g. "Daft Punk, Pharrell Williams".
    pub fn artist_line(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The track on air plus how far into it the server says playback is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    #[serde(flatten)]
    pub track: Track,
    #[serde(
        rename = "position",
        default,
        deserialize_with = "wire::lenient_millis"
    )]
    pub position_ms: u64,
}

impl NowPlaying {
    pub fn new(track: Track, position_ms: u64) -> Self {
        Self { track, position_ms }
    }

    pub fn nothing_playing() -> Self {
        Self::new(Track::sentinel(), 0)
    }

    pub fn is_nothing_playing(&self) -> bool {
        self.track.is_sentinel()
    }

    /// Position clamped into `0..=duration_ms`; server clock skew can report
    /// positions past the end of the track.
    pub fn clamped_position_ms(&self) -> u64 {
        self.position_ms.min(self.track.duration_ms)
    }

    pub fn remaining_ms(&self) -> u64 {
        self.track.duration_ms - self.clamped_position_ms()
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.track.duration_ms > 0 {
            (self.clamped_position_ms() as f64 / self.track.duration_ms as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// A NowPlaying together with the instant it was received, so the elapsed
/// position can be extrapolated between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub now_playing: NowPlaying,
    pub received_at: Instant,
}

impl PlaybackSnapshot {
    pub fn new(now_playing: NowPlaying) -> Self {
        Self {
            now_playing,
            received_at: Instant::now(),
        }
    }

    pub fn nothing_playing() -> Self {
        Self::new(NowPlaying::nothing_playing())
    }

    pub fn track(&self) -> &Track {
        &self.now_playing.track
    }

    /// Reported position advanced by the time since receipt, never past the end.
    pub fn elapsed(&self) -> Duration {
        let reported = Duration::from_millis(self.now_playing.clamped_position_ms());
        (reported + self.received_at.elapsed()).min(self.now_playing.track.duration())
    }
}

/// Outcome of the most recent completed search. Replaced in full by the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    pub tracks: Vec<Track>,
    /// Set when the search call failed; `tracks` is then empty.
    pub failed: bool,
}

impl SearchResults {
    pub fn completed(query: String, tracks: Vec<Track>) -> Self {
        Self {
            query,
            tracks,
            failed: false,
        }
    }

    pub fn failed(query: String) -> Self {
        Self {
            query,
            tracks: Vec::new(),
            failed: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
