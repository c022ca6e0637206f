use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::game::GameMode;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub http: HttpConfig,
    pub channel: ChannelConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub music: MusicConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

/// request/response endpoints for session lifecycle
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// per-player notification channel
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// defaults for sessions created without explicit settings
#[derive(Debug, Deserialize, Clone)]
pub struct GameConfig {
    #[serde(default = "default_target_count")]
    pub default_target_count: usize,
    #[serde(default)]
    pub default_mode: GameMode,
}

fn default_target_count() -> usize {
    10
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_target_count: default_target_count(),
            default_mode: GameMode::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MusicConfig {
    #[serde(default = "default_spotify_api_base")]
    pub spotify_api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// tracks served by the mock music source
    #[serde(default)]
    pub playlist: Vec<PlaylistEntry>,
}

fn default_spotify_api_base() -> String {
    crate::music::spotify::DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            spotify_api_base: default_spotify_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
            playlist: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaylistEntry {
    pub title: String,
    pub performer: String,
    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
    pub release_date: String,
    pub cover_art_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[http]
bind_addr = "127.0.0.1"
port = 8080

[channel]
bind_addr = "0.0.0.0"
port = 8081

[game]
default_target_count = 5
default_mode = "simultaneous"

[music]
request_timeout_secs = 3

[[music.playlist]]
title = "Yesterday"
performer = "The Beatles"
release_date = "1965-08-06"

[[music.playlist]]
title = "Bad Guy"
performer = "Billie Eilish"
release_date = "2019"
cover_art_url = "http://img/bad-guy.jpg"
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.channel.bind_addr, "0.0.0.0");
        assert_eq!(cfg.game.default_target_count, 5);
        assert_eq!(cfg.game.default_mode, GameMode::Simultaneous);
        assert_eq!(cfg.music.request_timeout_secs, 3);
        assert_eq!(cfg.music.spotify_api_base, "https://api.spotify.com/v1");
        assert_eq!(cfg.music.playlist.len(), 2);
        assert_eq!(
            cfg.music.playlist[1].cover_art_url.as_deref(),
            Some("http://img/bad-guy.jpg")
        );

        Ok(())
    }

    #[test]
    fn test_parse_minimal_config() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[http]
bind_addr = "127.0.0.1"
port = 8080

[channel]
bind_addr = "127.0.0.1"
port = 8081
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.game.default_target_count, 10);
        assert_eq!(cfg.game.default_mode, GameMode::Sequential);
        assert!(cfg.music.playlist.is_empty());

        Ok(())
    }

    #[test]
    fn test_load_config_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "version = 2\n[http]\nbind_addr = \"::1\"\nport = 1\n[channel]\nbind_addr = \"::1\"\nport = 2"
        )?;

        let cfg = Config::load(file.path())?;
        assert_eq!(cfg.version, 2);
        assert_eq!(cfg.channel.port, 2);

        Ok(())
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.toml")).is_err());
    }
}
