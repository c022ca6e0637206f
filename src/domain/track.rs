use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Represent a music track, as reported by a music source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub performer: String,
    pub release_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<ArtworkRef>,
}

/// url of the cover art image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtworkRef(pub String);

impl Track {
    pub fn new(title: impl Into<String>, performer: impl Into<String>, release_year: i32) -> Self {
        Self {
            title: title.into(),
            performer: performer.into(),
            release_year,
            cover_art: None,
        }
    }

    pub fn with_cover_art(mut self, url: impl Into<String>) -> Self {
        self.cover_art = Some(ArtworkRef(url.into()));
        self
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' by {} ({})",
            self.title, self.performer, self.release_year
        )
    }
}
