//! Messages exchanged over the per-player channel.
//!
//! Every message is one JSON object per line, tagged by its `type` field, e.g.
//! `{"type":"guess","index":2}`. `ClientMessage` flows from players to the
//! server, `ServerEvent` from the server to players.

use serde::{Deserialize, Serialize};

use crate::{
    domain::track::Track,
    game::{GameMode, GuessOutcome, GuessResult},
};

/// Messages sent by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a connection: who is connecting to which session.
    Hello {
        session_id: String,
        player_name: String,
    },
    /// The current track belongs at `index` of the player's collection.
    Guess { index: i64 },
    /// The player leaves; the server closes the connection.
    Goodbye,
}

/// Events sent to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Hello accepted.
    Welcome {
        session_id: String,
        player: String,
        message: String,
    },
    /// Hello refused; the connection is closed afterwards.
    Rejected { reason: String },
    PlayerJoined { player: String },
    GameStarted {
        players: Vec<String>,
        mode: GameMode,
        target_count: usize,
    },
    /// The receiving player may guess now.
    YourTurn {
        player: String,
        tracks: Vec<Track>,
        message: String,
    },
    /// Full result, sent to the player who guessed.
    GuessResult(GuessOutcome),
    /// Reduced result, sent to everybody else.
    OtherPlayerGuess {
        player: String,
        result: GuessResult,
        next_player: Option<String>,
        message: String,
    },
    PlayerLeft { player: String },
    GameOver { winner: String, message: String },
    /// A request of the receiving player was refused.
    Error { message: String },
}
