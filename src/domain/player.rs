use serde::{Deserialize, Serialize};

use super::track::Track;

/// A participant of a game session.
///
/// `tracks` is kept sorted by release year (ascending, ties in insertion order).
/// Tracks are only inserted by the game session after the insertion point
/// has been validated, so the list is sorted by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    tracks: Vec<Track>,
    pub connected: bool,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            connected: true,
        }
    }

    pub fn disconnected(name: impl Into<String>) -> Self {
        Self {
            connected: false,
            ..Self::new(name)
        }
    }

    /// collected tracks, oldest first
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn insert_track(&mut self, index: usize, track: Track) {
        self.tracks.insert(index, track);
    }
}
