use std::time::Duration;

use log::{debug, warn};
use reqwest::{StatusCode, blocking::Client, header};
use serde::Deserialize;

use crate::domain::track::Track;

use super::{MusicSource, MusicSourceError, MusicSourceKind, parse_release_year};

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Reads and controls the playback of a Spotify account through the Web API.
///
/// The access token is obtained by the client (OAuth happens outside of the
/// game server) and is passed through as a bearer credential.
pub struct SpotifySource {
    api_base: String,
    access_token: Option<String>,
    http: Client,
}

impl SpotifySource {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, MusicSourceError> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: None,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn token(&self) -> Result<&str, MusicSourceError> {
        self.access_token
            .as_deref()
            .ok_or(MusicSourceError::NotAuthenticated)
    }

    fn skip(&self) -> Result<reqwest::blocking::Response, MusicSourceError> {
        Ok(self
            .http
            .post(self.url("/me/player/next"))
            .bearer_auth(self.token()?)
            .header(header::CONTENT_LENGTH, 0)
            .send()?)
    }
}

impl MusicSource for SpotifySource {
    fn kind(&self) -> MusicSourceKind {
        MusicSourceKind::Spotify
    }

    fn is_ready(&self) -> bool {
        self.access_token.is_some()
    }

    fn authenticate(&mut self, access_token: &str) -> Result<(), MusicSourceError> {
        if access_token.trim().is_empty() {
            return Err(MusicSourceError::NotAuthenticated);
        }
        self.access_token = Some(access_token.to_string());
        Ok(())
    }

    fn current_track(&self) -> Result<Track, MusicSourceError> {
        let response = self
            .http
            .get(self.url("/me/player"))
            .bearer_auth(self.token()?)
            .send()?;

        if response.status() == StatusCode::NO_CONTENT {
            return Err(MusicSourceError::SourceUnavailable(
                "no active playback".into(),
            ));
        }

        let playback: PlaybackState = response.error_for_status()?.json()?;
        track_from_playback(playback)
    }

    fn start_playback(&mut self) -> Result<(), MusicSourceError> {
        let response = self
            .http
            .put(self.url("/me/player/play"))
            .bearer_auth(self.token()?)
            .header(header::CONTENT_LENGTH, 0)
            .send()?;

        if response.status().is_success() {
            return Ok(());
        }

        // most likely something is already playing
        debug!(
            "starting playback returned {}, skipping to next track instead",
            response.status()
        );
        let response = self.skip()?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!("spotify refused to start playback: {}", response.status());
            Err(MusicSourceError::SourceUnavailable(format!(
                "cannot start playback ({}), is spotify running?",
                response.status()
            )))
        }
    }

    fn advance_to_next(&mut self) -> Result<(), MusicSourceError> {
        self.skip()?.error_for_status()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackState {
    is_playing: bool,
    item: Option<PlaybackItem>,
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    name: String,
    artists: Vec<Artist>,
    album: Album,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    release_date: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

fn track_from_playback(playback: PlaybackState) -> Result<Track, MusicSourceError> {
    let item = match playback.item {
        Some(item) if playback.is_playing => item,
        _ => {
            return Err(MusicSourceError::SourceUnavailable(
                "spotify is not playing".into(),
            ));
        }
    };

    let performer = item
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let track = Track::new(item.name, performer, parse_release_year(&item.album.release_date)?);

    // images are ordered largest first
    Ok(match item.album.images.into_iter().last() {
        Some(image) => track.with_cover_art(image.url),
        None => track,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rouille::{Request, Response};
    use std::sync::{Arc, Mutex};

    fn playback_json(is_playing: bool) -> serde_json::Value {
        serde_json::json!({
            "is_playing": is_playing,
            "item": {
                "name": "Smells Like Teen Spirit",
                "artists": [{ "name": "Nirvana" }, { "name": "Butch Vig" }],
                "album": {
                    "release_date": "1991-09-10",
                    "images": [
                        { "url": "http://img/640.jpg" },
                        { "url": "http://img/64.jpg" }
                    ]
                }
            }
        })
    }

    #[test]
    fn converts_playback_state_to_track() -> anyhow::Result<()> {
        let playback: PlaybackState = serde_json::from_value(playback_json(true))?;
        let track = track_from_playback(playback)?;

        assert_eq!(track.title, "Smells Like Teen Spirit");
        assert_eq!(track.performer, "Nirvana, Butch Vig");
        assert_eq!(track.release_year, 1991);
        assert_eq!(track.cover_art.map(|a| a.0).as_deref(), Some("http://img/64.jpg"));
        Ok(())
    }

    #[test]
    fn paused_playback_is_unavailable() -> anyhow::Result<()> {
        let playback: PlaybackState = serde_json::from_value(playback_json(false))?;
        assert!(matches!(
            track_from_playback(playback),
            Err(MusicSourceError::SourceUnavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn requests_need_authentication() -> anyhow::Result<()> {
        let mut source = SpotifySource::new("http://127.0.0.1:9", Duration::from_secs(1))?;
        assert!(!source.is_ready());
        assert!(matches!(
            source.current_track(),
            Err(MusicSourceError::NotAuthenticated)
        ));
        assert!(matches!(
            source.authenticate("  "),
            Err(MusicSourceError::NotAuthenticated)
        ));
        Ok(())
    }

    // --------------------------------------------------
    // against a fake web api
    // --------------------------------------------------

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn fake_api(
        play_status: u16,
        player: impl Fn() -> Response + Send + Sync + 'static,
    ) -> anyhow::Result<(SpotifySource, CallLog, impl FnOnce())> {
        let calls: CallLog = Arc::default();
        let log = Arc::clone(&calls);

        let server = rouille::Server::new("127.0.0.1:0", move |request: &Request| {
            log.lock().unwrap().push(format!(
                "{} {} {}",
                request.method(),
                request.url(),
                request.header("Authorization").unwrap_or_default()
            ));
            rouille::router!(request,
                (GET) (/me/player) => { player() },
                (PUT) (/me/player/play) => {
                    Response::text("").with_status_code(play_status)
                },
                (POST) (/me/player/next) => { Response::empty_204() },
                _ => Response::empty_404()
            )
        })
        .map_err(|e| anyhow!("failed to start fake api: {e}"))?;

        let addr = server.server_addr();
        let (handle, stop) = server.stoppable();

        let mut source = SpotifySource::new(format!("http://{addr}"), Duration::from_secs(5))?;
        source.authenticate("secret")?;

        let shutdown = move || {
            let _ = stop.send(());
            let _ = handle.join();
        };
        Ok((source, calls, shutdown))
    }

    #[test]
    fn reads_current_track_with_bearer_token() -> anyhow::Result<()> {
        let (source, calls, shutdown) =
            fake_api(204, || Response::json(&playback_json(true)))?;

        let track = source.current_track();
        shutdown();

        assert_eq!(track?.release_year, 1991);
        assert_eq!(calls.lock().unwrap()[0], "GET /me/player Bearer secret");
        Ok(())
    }

    #[test]
    fn nothing_playing_is_unavailable() -> anyhow::Result<()> {
        let (source, _, shutdown) = fake_api(204, Response::empty_204)?;

        let result = source.current_track();
        shutdown();

        assert!(matches!(result, Err(MusicSourceError::SourceUnavailable(_))));
        Ok(())
    }

    #[test]
    fn start_playback_falls_back_to_skip() -> anyhow::Result<()> {
        let (mut source, calls, shutdown) =
            fake_api(403, || Response::json(&playback_json(true)))?;

        let result = source.start_playback();
        shutdown();

        assert!(result.is_ok());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("PUT /me/player/play"));
        assert!(calls[1].starts_with("POST /me/player/next"));
        Ok(())
    }

    #[test]
    fn advance_skips_to_next() -> anyhow::Result<()> {
        let (mut source, calls, shutdown) =
            fake_api(204, || Response::json(&playback_json(true)))?;

        let result = source.advance_to_next();
        shutdown();

        assert!(result.is_ok());
        assert_eq!(calls.lock().unwrap().as_slice(), ["POST /me/player/next Bearer secret"]);
        Ok(())
    }
}
