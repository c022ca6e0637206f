use thiserror::Error;

use crate::music::MusicSourceError;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("insertion index {index} is outside of 0..={len}")]
    InvalidIndex { index: i64, len: usize },

    #[error("game is not running")]
    GameNotRunning,

    #[error("game is already running")]
    AlreadyRunning,

    #[error("game is over, {winner} won")]
    GameOver { winner: String },

    #[error("it is not {player}'s turn")]
    NotYourTurn { player: String },

    #[error("{player} has already guessed this track")]
    AlreadyGuessed { player: String },

    #[error("player {0} is not part of this game")]
    UnknownPlayer(String),

    #[error("not enough players to start the game")]
    NotEnoughPlayers,

    #[error("music source is not ready")]
    MusicSourceUnavailable,

    #[error(transparent)]
    Source(#[from] MusicSourceError),
}
