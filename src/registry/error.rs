use thiserror::Error;

use crate::{game::GameError, music::MusicSourceError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} already exists, choose a different id")]
    SessionAlreadyExists(String),

    #[error("player {0} already joined this session")]
    PlayerAlreadyJoined(String),

    #[error("player {0} cannot join: {1}")]
    PlayerNotEligible(String, String),

    #[error("player {0} is already connected")]
    AlreadyActive(String),

    #[error("player {0} is not a member of this session")]
    NotAMember(String),

    #[error("invalid session settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Source(#[from] MusicSourceError),
}
