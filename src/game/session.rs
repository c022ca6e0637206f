use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{player::Player, track::Track},
    music::{MusicSource, MusicSourceKind},
};

use super::{
    error::GameError,
    strategy::{GameMode, Progression, TurnStrategy},
    validator::is_valid_insertion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuessResult {
    Correct,
    Wrong,
}

impl std::fmt::Display for GuessResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::Wrong => write!(f, "wrong"),
        }
    }
}

/// Everything the players need to know about a processed guess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessOutcome {
    pub player: String,
    pub result: GuessResult,
    pub index: usize,
    /// the track that was guessed, shown even when the guess was wrong
    pub track: Track,
    /// the guesser's collection after the guess
    pub tracks: Vec<Track>,
    pub other_players: Vec<Player>,
    pub game_over: bool,
    /// empty unless the game is over
    pub winner: String,
    pub next_player: Option<String>,
    pub track_changed: bool,
}

/// One game: the players, the turn strategy and the music source that
/// provides the tracks to guess.
///
/// All mutation goes through `&mut self`; the registry keeps each session
/// behind its own lock.
pub struct GameSession {
    players: Vec<Player>,
    target_count: usize,
    strategy: Box<dyn TurnStrategy>,
    music: Box<dyn MusicSource>,
    running: bool,
    winner: Option<String>,
    /// a track change the music source failed to carry out
    skip_pending: bool,
}

impl GameSession {
    pub fn new(
        target_count: usize,
        strategy: Box<dyn TurnStrategy>,
        music: Box<dyn MusicSource>,
    ) -> Self {
        Self {
            players: Vec::new(),
            target_count,
            strategy,
            music,
            running: false,
            winner: None,
            skip_pending: false,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn mode(&self) -> GameMode {
        self.strategy.mode()
    }

    pub fn source_kind(&self) -> MusicSourceKind {
        self.music.kind()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    pub fn music_mut(&mut self) -> &mut dyn MusicSource {
        self.music.as_mut()
    }

    /// Starts the game with the given players, in turn order.
    pub fn start_game(&mut self, players: Vec<Player>) -> Result<(), GameError> {
        if self.running {
            return Err(GameError::AlreadyRunning);
        }
        if let Some(winner) = &self.winner {
            return Err(GameError::GameOver {
                winner: winner.clone(),
            });
        }
        if players.is_empty() {
            return Err(GameError::NotEnoughPlayers);
        }
        if !self.music.is_ready() {
            return Err(GameError::MusicSourceUnavailable);
        }
        self.music.start_playback()?;

        self.strategy.reset(&players);
        self.players = players;
        self.running = true;
        self.skip_pending = false;
        info!(
            "game started with {} players, {} mode, {} tracks to win",
            self.players.len(),
            self.mode(),
            self.target_count
        );
        Ok(())
    }

    /// Processes the guess of `player_name` that the current track belongs at
    /// `index` of their collection.
    ///
    /// Either the whole guess is applied or nothing is: rejected turns, bad
    /// indices and music source failures leave the session untouched.
    pub fn submit_guess(
        &mut self,
        player_name: &str,
        index: usize,
    ) -> Result<GuessOutcome, GameError> {
        if !self.running {
            return Err(GameError::GameNotRunning);
        }
        self.strategy.validate_turn(player_name, &self.players)?;

        let position = self
            .players
            .iter()
            .position(|p| p.name == player_name)
            .ok_or_else(|| GameError::UnknownPlayer(player_name.to_string()))?;

        let len = self.players[position].track_count();
        if index > len {
            return Err(GameError::InvalidIndex {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len,
            });
        }

        self.catch_up_track()?;
        let track = self.music.current_track()?;
        let collected = self.players[position].tracks();
        let result = if is_valid_insertion(collected, index, &track)? {
            GuessResult::Correct
        } else {
            GuessResult::Wrong
        };
        let new_count = collected.len() + usize::from(result == GuessResult::Correct);

        let progression = if new_count >= self.target_count {
            Progression::default()
        } else {
            // advance on a copy, so a failing music source leaves the turn as it was
            let mut strategy = self.strategy.boxed_clone();
            let progression = strategy.advance_after_guess(player_name, &self.players);
            if progression.track_changed {
                self.music.advance_to_next()?;
            }
            self.strategy = strategy;
            progression
        };

        if result == GuessResult::Correct {
            self.players[position].insert_track(index, track.clone());
        }
        debug!("{player_name} guessed index {index} for {track}: {result:?}");

        let game_over = new_count >= self.target_count;
        if game_over {
            info!("{player_name} collected {new_count} tracks and wins");
            self.running = false;
            self.winner = Some(player_name.to_string());
        }

        Ok(GuessOutcome {
            player: player_name.to_string(),
            result,
            index,
            track,
            tracks: self.players[position].tracks().to_vec(),
            other_players: self
                .players
                .iter()
                .filter(|p| p.name != player_name)
                .cloned()
                .collect(),
            game_over,
            winner: self.winner.clone().unwrap_or_default(),
            next_player: progression.next_player,
            track_changed: progression.track_changed,
        })
    }

    /// players who should be told it is their turn now
    pub fn players_to_notify_for_next_turn(&self) -> Vec<&Player> {
        if !self.running {
            return Vec::new();
        }
        self.strategy.players_to_notify_for_next_turn(&self.players)
    }

    /// whether `player_name` may guess right now
    pub fn may_act(&self, player_name: &str) -> bool {
        self.running
            && self.player(player_name).is_some()
            && self
                .strategy
                .validate_turn(player_name, &self.players)
                .is_ok()
    }

    /// Flips the connectivity flag of a player and lets the strategy react,
    /// e.g. by passing the turn on from a player who left.
    ///
    /// If the strategy wants a new track and the music source fails to skip,
    /// the turn change still happens and the skip is retried before the next
    /// guess reads the track.
    pub fn set_connected(
        &mut self,
        player_name: &str,
        connected: bool,
    ) -> Result<Progression, GameError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.name == player_name)
            .ok_or_else(|| GameError::UnknownPlayer(player_name.to_string()))?;
        player.connected = connected;

        if !self.running {
            return Ok(Progression::default());
        }

        let progression = self.strategy.on_connectivity_change(&self.players);
        if progression.track_changed {
            if let Err(e) = self.music.advance_to_next() {
                warn!("could not skip to the next track, retrying on the next guess: {e}");
                self.skip_pending = true;
            }
        }
        Ok(progression)
    }

    fn catch_up_track(&mut self) -> Result<(), GameError> {
        if self.skip_pending {
            self.music.advance_to_next()?;
            self.skip_pending = false;
        }
        Ok(())
    }
}
