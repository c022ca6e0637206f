use log::warn;
use rouille::Response;
use serde::Serialize;

use crate::{game::GameError, music::MusicSourceError, registry::RegistryError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Forbidden(String),
    Unavailable(String),
}

impl From<MusicSourceError> for ApiError {
    fn from(err: MusicSourceError) -> Self {
        match err {
            MusicSourceError::UnknownKind(_) | MusicSourceError::BadReleaseDate(_) => {
                ApiError::BadRequest(err.to_string())
            }
            MusicSourceError::NotAuthenticated => ApiError::Forbidden(err.to_string()),
            MusicSourceError::SourceUnavailable(_) => ApiError::Unavailable(err.to_string()),
            MusicSourceError::Http(e) => {
                warn!("music service request failed: {e}");
                ApiError::Unavailable("music service request failed".into())
            }
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::InvalidIndex { .. } => ApiError::BadRequest(err.to_string()),
            GameError::GameNotRunning
            | GameError::AlreadyRunning
            | GameError::GameOver { .. }
            | GameError::NotEnoughPlayers => ApiError::Conflict(err.to_string()),
            GameError::NotYourTurn { .. }
            | GameError::AlreadyGuessed { .. }
            | GameError::UnknownPlayer(_) => ApiError::Forbidden(err.to_string()),
            GameError::MusicSourceUnavailable => ApiError::Unavailable(err.to_string()),
            GameError::Source(e) => e.into(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            RegistryError::SessionAlreadyExists(_)
            | RegistryError::PlayerAlreadyJoined(_)
            | RegistryError::AlreadyActive(_) => ApiError::Conflict(err.to_string()),
            RegistryError::PlayerNotEligible(..) | RegistryError::NotAMember(_) => {
                ApiError::Forbidden(err.to_string())
            }
            RegistryError::InvalidSettings(_) => ApiError::BadRequest(err.to_string()),
            RegistryError::Game(e) => e.into(),
            RegistryError::Source(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::NotFound(msg) => (404, msg),
            ApiError::BadRequest(msg) => (400, msg),
            ApiError::Conflict(msg) => (409, msg),
            ApiError::Forbidden(msg) => (403, msg),
            ApiError::Unavailable(msg) => (503, msg),
        };
        Response::json(&ErrorBody { error: msg }).with_status_code(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_map_to_status_codes() {
        let cases = [
            (RegistryError::SessionNotFound("x".into()), 404),
            (RegistryError::SessionAlreadyExists("x".into()), 409),
            (RegistryError::PlayerNotEligible("x".into(), "late".into()), 403),
            (RegistryError::InvalidSettings("x".into()), 400),
            (RegistryError::Game(GameError::NotEnoughPlayers), 409),
            (RegistryError::Game(GameError::MusicSourceUnavailable), 503),
            (
                RegistryError::Game(GameError::Source(MusicSourceError::NotAuthenticated)),
                403,
            ),
            (
                RegistryError::Source(MusicSourceError::UnknownKind("vinyl".into())),
                400,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status_code, status);
        }
    }
}
