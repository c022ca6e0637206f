//! Music sources: where the currently playing track comes from.
//!
//! The game only needs three things from a music service: the track that is
//! playing right now, a way to start playback and a way to skip ahead.
//! [`MusicSource`] is that capability; [`MusicSourceFactory`] creates one per
//! session from a [`MusicSourceKind`].

use std::{fmt::Display, str::FromStr, time::Duration};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{config::MusicConfig, domain::track::Track};

pub mod error;
pub mod playlist;
pub mod spotify;

pub use error::MusicSourceError;
pub use playlist::PlaylistSource;
pub use spotify::SpotifySource;

pub trait MusicSource: Send {
    fn kind(&self) -> MusicSourceKind;

    /// whether the source can serve tracks (e.g. has credentials)
    fn is_ready(&self) -> bool {
        true
    }

    /// hands a bearer credential to the underlying service
    fn authenticate(&mut self, _access_token: &str) -> Result<(), MusicSourceError> {
        Ok(())
    }

    fn current_track(&self) -> Result<Track, MusicSourceError>;

    fn start_playback(&mut self) -> Result<(), MusicSourceError>;

    fn advance_to_next(&mut self) -> Result<(), MusicSourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicSourceKind {
    Mock,
    Spotify,
}

impl FromStr for MusicSourceKind {
    type Err = MusicSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" | "dummy" => Ok(Self::Mock),
            "spotify" => Ok(Self::Spotify),
            other => Err(MusicSourceError::UnknownKind(other.to_string())),
        }
    }
}

impl Display for MusicSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Spotify => write!(f, "spotify"),
        }
    }
}

/// Extracts the year from release dates as music services report them:
/// `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
pub fn parse_release_year(date: &str) -> Result<i32, MusicSourceError> {
    let date = date.trim();
    let bad_date = || MusicSourceError::BadReleaseDate(date.to_string());

    let full = match date.len() {
        10 => date.to_string(),
        7 => format!("{date}-01"),
        4 => format!("{date}-01-01"),
        _ => return Err(bad_date()),
    };

    NaiveDate::parse_from_str(&full, "%Y-%m-%d")
        .map(|d| d.year())
        .map_err(|_| bad_date())
}

/// Creates music sources for new sessions
#[derive(Debug, Clone)]
pub struct MusicSourceFactory {
    playlist: Vec<Track>,
    spotify_api_base: String,
    request_timeout: Duration,
}

impl MusicSourceFactory {
    pub fn from_config(config: &MusicConfig) -> Result<Self, MusicSourceError> {
        let playlist = if config.playlist.is_empty() {
            playlist::default_playlist()
        } else {
            config
                .playlist
                .iter()
                .map(|entry| {
                    let track = Track::new(
                        entry.title.clone(),
                        entry.performer.clone(),
                        parse_release_year(&entry.release_date)?,
                    );
                    Ok(match &entry.cover_art_url {
                        Some(url) => track.with_cover_art(url.clone()),
                        None => track,
                    })
                })
                .collect::<Result<Vec<_>, MusicSourceError>>()?
        };

        Ok(Self {
            playlist,
            spotify_api_base: config.spotify_api_base.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn create(
        &self,
        kind: MusicSourceKind,
        access_token: Option<&str>,
    ) -> Result<Box<dyn MusicSource>, MusicSourceError> {
        let mut source: Box<dyn MusicSource> = match kind {
            MusicSourceKind::Mock => Box::new(PlaylistSource::new(self.playlist.clone())),
            MusicSourceKind::Spotify => Box::new(SpotifySource::new(
                self.spotify_api_base.clone(),
                self.request_timeout,
            )?),
        };
        if let Some(token) = access_token {
            source.authenticate(token)?;
        }
        Ok(source)
    }
}

impl Default for MusicSourceFactory {
    fn default() -> Self {
        Self {
            playlist: playlist::default_playlist(),
            spotify_api_base: spotify::DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaylistEntry;

    #[test]
    fn release_year_accepts_all_date_precisions() -> anyhow::Result<()> {
        assert_eq!(parse_release_year("1975-10-31")?, 1975);
        assert_eq!(parse_release_year("1991-09")?, 1991);
        assert_eq!(parse_release_year("2010")?, 2010);
        Ok(())
    }

    #[test]
    fn release_year_rejects_garbage() {
        for date in ["", "19", "1991-13", "yesterday", "2010-02-30"] {
            assert!(
                matches!(
                    parse_release_year(date),
                    Err(MusicSourceError::BadReleaseDate(_))
                ),
                "expected {date:?} to be rejected"
            );
        }
    }

    #[test]
    fn kind_parses_case_insensitively() -> anyhow::Result<()> {
        assert_eq!("Spotify".parse::<MusicSourceKind>()?, MusicSourceKind::Spotify);
        assert_eq!("mock".parse::<MusicSourceKind>()?, MusicSourceKind::Mock);
        assert!(matches!(
            "applemusic".parse::<MusicSourceKind>(),
            Err(MusicSourceError::UnknownKind(_))
        ));
        Ok(())
    }

    #[test]
    fn factory_uses_configured_playlist() -> anyhow::Result<()> {
        let config = MusicConfig {
            playlist: vec![PlaylistEntry {
                title: "Yesterday".into(),
                performer: "The Beatles".into(),
                release_date: "1965-08-06".into(),
                cover_art_url: Some("http://img/yesterday.jpg".into()),
            }],
            ..Default::default()
        };

        let factory = MusicSourceFactory::from_config(&config)?;
        let source = factory.create(MusicSourceKind::Mock, None)?;

        let track = source.current_track()?;
        assert_eq!(track.release_year, 1965);
        assert_eq!(track.cover_art.map(|a| a.0).as_deref(), Some("http://img/yesterday.jpg"));
        Ok(())
    }

    #[test]
    fn factory_spotify_source_needs_a_token() -> anyhow::Result<()> {
        let factory = MusicSourceFactory::default();

        let source = factory.create(MusicSourceKind::Spotify, None)?;
        assert!(!source.is_ready());

        let source = factory.create(MusicSourceKind::Spotify, Some("token"))?;
        assert!(source.is_ready());
        Ok(())
    }
}
