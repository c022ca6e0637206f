//! Turn strategies decide who may guess right now and when the track changes.
//!
//! The game session is mode-agnostic: it asks the strategy whether a guess is
//! legal, and after a guess it asks the strategy what happens next. A new game
//! mode only needs a new [`TurnStrategy`] implementation and a [`GameMode`]
//! variant.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::player::Player;

use super::error::GameError;

/// What changed after a guess (or after a player came or went)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progression {
    /// the single player whose turn it is now, in modes that have one
    pub next_player: Option<String>,
    /// whether the music source has to skip to the next track
    pub track_changed: bool,
}

impl Progression {
    /// whether a new turn began, so `players_to_notify_for_next_turn` must be notified
    pub fn starts_new_turn(&self) -> bool {
        self.next_player.is_some() || self.track_changed
    }
}

pub trait TurnStrategy: Send + std::fmt::Debug {
    fn mode(&self) -> GameMode;

    /// `Ok(())` if `player` may guess now, otherwise the reason why not
    fn validate_turn(&self, player: &str, players: &[Player]) -> Result<(), GameError>;

    /// Records a guess of `player` and moves the turn forward.
    ///
    /// The session skips the music source to the next track when the returned
    /// progression says so.
    fn advance_after_guess(&mut self, player: &str, players: &[Player]) -> Progression;

    /// Re-evaluates the turn after some player connected or disconnected.
    fn on_connectivity_change(&mut self, players: &[Player]) -> Progression;

    /// players that should be told it is their turn. Calling it does not change anything.
    fn players_to_notify_for_next_turn<'a>(&self, players: &'a [Player]) -> Vec<&'a Player>;

    /// forget all turn tracking, as at the start of a game
    fn reset(&mut self, players: &[Player]);

    fn boxed_clone(&self) -> Box<dyn TurnStrategy>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Sequential,
    Simultaneous,
}

impl GameMode {
    pub fn strategy(self) -> Box<dyn TurnStrategy> {
        match self {
            GameMode::Sequential => Box::new(Sequential::default()),
            GameMode::Simultaneous => Box::new(Simultaneous::default()),
        }
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "simultaneous" => Ok(Self::Simultaneous),
            other => Err(format!(
                "unknown game mode '{other}', expected 'sequential' or 'simultaneous'"
            )),
        }
    }
}

impl Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Sequential => write!(f, "sequential"),
            GameMode::Simultaneous => write!(f, "simultaneous"),
        }
    }
}

/// Players take turns one after another, every turn gets a fresh track.
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    current: usize,
}

impl Sequential {
    pub fn current_player<'a>(&self, players: &'a [Player]) -> Option<&'a Player> {
        players.get(self.current)
    }

    /// next connected player after the current one, wrapping around.
    /// The current player itself comes last.
    fn next_connected(&self, players: &[Player]) -> Option<usize> {
        let len = players.len();
        (1..=len)
            .map(|step| (self.current + step) % len)
            .find(|&index| players[index].connected)
    }
}

impl TurnStrategy for Sequential {
    fn mode(&self) -> GameMode {
        GameMode::Sequential
    }

    fn validate_turn(&self, player: &str, players: &[Player]) -> Result<(), GameError> {
        match self.current_player(players) {
            Some(current) if current.name == player => Ok(()),
            _ => Err(GameError::NotYourTurn {
                player: player.to_string(),
            }),
        }
    }

    fn advance_after_guess(&mut self, _player: &str, players: &[Player]) -> Progression {
        if players.is_empty() {
            return Progression::default();
        }

        // with nobody connected the turn still moves on, the track is consumed
        self.current = self
            .next_connected(players)
            .unwrap_or((self.current + 1) % players.len());

        Progression {
            next_player: Some(players[self.current].name.clone()),
            track_changed: true,
        }
    }

    fn on_connectivity_change(&mut self, players: &[Player]) -> Progression {
        match self.current_player(players) {
            Some(current) if !current.connected => match self.next_connected(players) {
                Some(next) => {
                    self.current = next;
                    Progression {
                        next_player: Some(players[next].name.clone()),
                        track_changed: false,
                    }
                }
                None => Progression::default(),
            },
            _ => Progression::default(),
        }
    }

    fn players_to_notify_for_next_turn<'a>(&self, players: &'a [Player]) -> Vec<&'a Player> {
        self.current_player(players).into_iter().collect()
    }

    fn reset(&mut self, players: &[Player]) {
        self.current = players.iter().position(|p| p.connected).unwrap_or(0);
    }

    fn boxed_clone(&self) -> Box<dyn TurnStrategy> {
        Box::new(self.clone())
    }
}

/// Everybody guesses the same track; the track changes once every connected
/// player has guessed.
#[derive(Debug, Clone, Default)]
pub struct Simultaneous {
    guessed: BTreeSet<String>,
}

impl Simultaneous {
    pub fn has_guessed(&self, player: &str) -> bool {
        self.guessed.contains(player)
    }

    fn round_complete(&self, players: &[Player]) -> bool {
        !self.guessed.is_empty()
            && players
                .iter()
                .filter(|p| p.connected)
                .all(|p| self.guessed.contains(&p.name))
    }

    fn finish_round_if_complete(&mut self, players: &[Player]) -> Progression {
        if self.round_complete(players) {
            self.guessed.clear();
            Progression {
                next_player: None,
                track_changed: true,
            }
        } else {
            Progression::default()
        }
    }
}

impl TurnStrategy for Simultaneous {
    fn mode(&self) -> GameMode {
        GameMode::Simultaneous
    }

    fn validate_turn(&self, player: &str, _players: &[Player]) -> Result<(), GameError> {
        if self.has_guessed(player) {
            return Err(GameError::AlreadyGuessed {
                player: player.to_string(),
            });
        }
        Ok(())
    }

    fn advance_after_guess(&mut self, player: &str, players: &[Player]) -> Progression {
        self.guessed.insert(player.to_string());
        self.finish_round_if_complete(players)
    }

    fn on_connectivity_change(&mut self, players: &[Player]) -> Progression {
        self.finish_round_if_complete(players)
    }

    fn players_to_notify_for_next_turn<'a>(&self, players: &'a [Player]) -> Vec<&'a Player> {
        if self.guessed.is_empty() {
            players.iter().collect()
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self, _players: &[Player]) {
        self.guessed.clear();
    }

    fn boxed_clone(&self) -> Box<dyn TurnStrategy> {
        Box::new(self.clone())
    }
}
