use crate::domain::track::Track;

use super::{MusicSource, MusicSourceError, MusicSourceKind};

/// Plays a fixed list of tracks, looping back to the start after the last one.
///
/// Used for local games and tests, where no streaming service is involved.
#[derive(Debug, Clone)]
pub struct PlaylistSource {
    tracks: Vec<Track>,
    position: usize,
}

impl PlaylistSource {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            position: 0,
        }
    }

    #[cfg(test)]
    fn position(&self) -> usize {
        self.position
    }
}

impl MusicSource for PlaylistSource {
    fn kind(&self) -> MusicSourceKind {
        MusicSourceKind::Mock
    }

    fn is_ready(&self) -> bool {
        !self.tracks.is_empty()
    }

    fn current_track(&self) -> Result<Track, MusicSourceError> {
        self.tracks
            .get(self.position)
            .cloned()
            .ok_or_else(|| MusicSourceError::SourceUnavailable("playlist is empty".into()))
    }

    fn start_playback(&mut self) -> Result<(), MusicSourceError> {
        if self.tracks.is_empty() {
            return Err(MusicSourceError::SourceUnavailable(
                "playlist is empty".into(),
            ));
        }
        self.position = 0;
        Ok(())
    }

    fn advance_to_next(&mut self) -> Result<(), MusicSourceError> {
        if self.tracks.is_empty() {
            return Err(MusicSourceError::SourceUnavailable(
                "playlist is empty".into(),
            ));
        }
        self.position = (self.position + 1) % self.tracks.len();
        Ok(())
    }
}

/// playlist used when the config does not define one
pub fn default_playlist() -> Vec<Track> {
    vec![
        Track::new("Yesterday", "The Beatles", 1965),
        Track::new("Bohemian Rhapsody", "Queen", 1975),
        Track::new("Smells Like Teen Spirit", "Nirvana", 1991),
        Track::new("Rolling in the Deep", "Adele", 2010),
        Track::new("Bad Guy", "Billie Eilish", 2019),
        Track::new("Drivers License", "Olivia Rodrigo", 2021),
    ]
}
