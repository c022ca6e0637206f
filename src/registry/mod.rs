//! Keeps every live game session and routes events to connected players.
//!
//! The session map is locked only to look up, insert or remove entries. Each
//! session sits behind its own mutex, so a slow music source in one session
//! never holds up the others.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc::Sender},
};

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;

use crate::{
    channel::message::ServerEvent,
    domain::player::Player,
    game::{GameError, GameMode, GameSession, GuessOutcome, Progression},
    music::{MusicSourceFactory, MusicSourceKind},
};

pub mod error;

pub use error::RegistryError;

/// Sending half of a player's connection.
pub type ConnectionHandle = Sender<ServerEvent>;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub target_count: usize,
    pub mode: GameMode,
    pub source: MusicSourceKind,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub mode: GameMode,
    pub source: MusicSourceKind,
    pub target_count: usize,
    pub running: bool,
    pub winner: Option<String>,
    pub created_at: String,
    pub participants: Vec<ParticipantStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStatus {
    pub name: String,
    pub connected: bool,
    pub tracks: usize,
}

struct Participant {
    name: String,
    handle: Option<ConnectionHandle>,
}

struct SessionEntry {
    game: GameSession,
    participants: Vec<Participant>,
    created_at: DateTime<Local>,
    /// set once the session is on its way out of the map
    closed: bool,
}

impl SessionEntry {
    fn participant_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.name == name)
    }

    fn connected_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.handle.is_some())
            .count()
    }

    fn send_to(&self, name: &str, event: ServerEvent) {
        let Some(handle) = self
            .participants
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.handle.as_ref())
        else {
            return;
        };
        if handle.send(event).is_err() {
            warn!("connection of {name} is gone, event dropped");
        }
    }

    fn broadcast(&self, except: Option<&str>, event: &ServerEvent) {
        for participant in &self.participants {
            if Some(participant.name.as_str()) == except {
                continue;
            }
            if let Some(handle) = &participant.handle {
                if handle.send(event.clone()).is_err() {
                    warn!("connection of {} is gone, event dropped", participant.name);
                }
            }
        }
    }

    fn send_your_turn(&self, player: &Player) {
        self.send_to(
            &player.name,
            ServerEvent::YourTurn {
                player: player.name.clone(),
                tracks: player.tracks().to_vec(),
                message: "It's your turn!".to_string(),
            },
        );
    }

    /// Tells the players the strategy picked that they may guess, returns
    /// their names.
    fn notify_next_turn(&self) -> Vec<String> {
        let players = self.game.players_to_notify_for_next_turn();
        for player in &players {
            self.send_your_turn(player);
        }
        players.into_iter().map(|p| p.name.clone()).collect()
    }

    /// Nobody is connected and there is no running game to come back to.
    fn is_abandoned(&self) -> bool {
        self.connected_count() == 0 && !self.game.is_running()
    }

    fn status(&self, session_id: &str) -> SessionStatus {
        SessionStatus {
            session_id: session_id.to_string(),
            mode: self.game.mode(),
            source: self.game.source_kind(),
            target_count: self.game.target_count(),
            running: self.game.is_running(),
            winner: self.game.winner().map(str::to_string),
            created_at: self.created_at.to_rfc3339(),
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantStatus {
                    name: p.name.clone(),
                    connected: p.handle.is_some(),
                    tracks: self.game.player(&p.name).map_or(0, Player::track_count),
                })
                .collect(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type SharedEntry = Arc<Mutex<SessionEntry>>;

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SharedEntry>>,
    sources: MusicSourceFactory,
}

impl SessionRegistry {
    pub fn new(sources: MusicSourceFactory) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sources,
        }
    }

    /// Looks a session up by its id, ignoring surrounding whitespace.
    fn entry(&self, session_id: &str) -> Result<SharedEntry, RegistryError> {
        let session_id = session_id.trim();
        lock(&self.sessions)
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))
    }

    /// Runs `f` on the session with its lock held. `f` gets the trimmed id.
    fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionEntry, &str) -> Result<R, RegistryError>,
    ) -> Result<R, RegistryError> {
        let session_id = session_id.trim();
        let shared = self.entry(session_id)?;
        let (result, closed) = {
            let mut entry = lock(&shared);
            if entry.closed {
                return Err(RegistryError::SessionNotFound(session_id.to_string()));
            }
            let result = f(&mut *entry, session_id);
            (result, entry.closed)
        };
        if closed {
            self.discard(session_id, &shared);
        }
        result
    }

    fn discard(&self, session_id: &str, shared: &SharedEntry) {
        let mut sessions = lock(&self.sessions);
        if sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, shared))
        {
            sessions.remove(session_id);
            info!("session {session_id} removed");
        }
    }

    pub fn create_session(
        &self,
        session_id: &str,
        settings: SessionSettings,
    ) -> Result<(), RegistryError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(RegistryError::InvalidSettings(
                "session id must not be empty".into(),
            ));
        }
        if settings.target_count == 0 {
            return Err(RegistryError::InvalidSettings(
                "target count must be at least 1".into(),
            ));
        }

        let music = self
            .sources
            .create(settings.source, settings.access_token.as_deref())?;
        let game = GameSession::new(settings.target_count, settings.mode.strategy(), music);

        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(session_id) {
            return Err(RegistryError::SessionAlreadyExists(session_id.to_string()));
        }
        sessions.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(SessionEntry {
                game,
                participants: Vec::new(),
                created_at: Local::now(),
                closed: false,
            })),
        );
        info!(
            "session {session_id} created: {} mode, {} source, {} tracks to win",
            settings.mode, settings.source, settings.target_count
        );
        Ok(())
    }

    /// ids of the sessions that have not started yet, sorted
    pub fn list_joinable(&self) -> Vec<String> {
        let entries: Vec<(String, SharedEntry)> = lock(&self.sessions)
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut joinable: Vec<String> = entries
            .into_iter()
            .filter(|(_, shared)| {
                let entry = lock(shared);
                !entry.closed && !entry.game.is_running() && !entry.game.is_finished()
            })
            .map(|(id, _)| id)
            .collect();
        joinable.sort();
        joinable
    }

    pub fn status(&self, session_id: &str) -> Result<SessionStatus, RegistryError> {
        self.with_session(session_id, |entry, session_id| Ok(entry.status(session_id)))
    }

    pub fn join_session(&self, session_id: &str, player_name: &str) -> Result<(), RegistryError> {
        let player_name = player_name.trim();
        self.with_session(session_id, |entry, session_id| {
            if player_name.is_empty() {
                return Err(RegistryError::PlayerNotEligible(
                    player_name.to_string(),
                    "a name is required".into(),
                ));
            }
            if entry.game.is_running() || entry.game.is_finished() {
                return Err(RegistryError::PlayerNotEligible(
                    player_name.to_string(),
                    "the game has already started".into(),
                ));
            }
            if entry.participants.iter().any(|p| p.name == player_name) {
                return Err(RegistryError::PlayerAlreadyJoined(player_name.to_string()));
            }

            entry.participants.push(Participant {
                name: player_name.to_string(),
                handle: None,
            });
            entry.broadcast(
                Some(player_name),
                &ServerEvent::PlayerJoined {
                    player: player_name.to_string(),
                },
            );
            info!("{player_name} joined session {session_id}");
            Ok(())
        })
    }

    /// Starts the game with every participant, in join order. Returns the
    /// players whose turn it is.
    pub fn start_session(&self, session_id: &str) -> Result<Vec<String>, RegistryError> {
        self.with_session(session_id, |entry, session_id| {
            if entry.participants.is_empty() {
                return Err(GameError::NotEnoughPlayers.into());
            }

            let players = entry
                .participants
                .iter()
                .map(|p| match p.handle {
                    Some(_) => Player::new(p.name.clone()),
                    None => Player::disconnected(p.name.clone()),
                })
                .collect();
            entry.game.start_game(players)?;
            info!("session {session_id} started");

            entry.broadcast(
                None,
                &ServerEvent::GameStarted {
                    players: entry.participants.iter().map(|p| p.name.clone()).collect(),
                    mode: entry.game.mode(),
                    target_count: entry.game.target_count(),
                },
            );
            Ok(entry.notify_next_turn())
        })
    }

    /// Processes a guess and delivers the outcome: the full result to the
    /// guesser, a summary to everyone else, then either the end of the game or
    /// the next turn.
    pub fn submit_guess(
        &self,
        session_id: &str,
        player_name: &str,
        index: i64,
    ) -> Result<GuessOutcome, RegistryError> {
        self.with_session(session_id, |entry, session_id| {
            let index = usize::try_from(index).map_err(|_| GameError::InvalidIndex {
                index,
                len: entry
                    .game
                    .player(player_name)
                    .map_or(0, Player::track_count),
            })?;
            let outcome = entry.game.submit_guess(player_name, index)?;

            entry.send_to(player_name, ServerEvent::GuessResult(outcome.clone()));

            if outcome.game_over {
                entry.broadcast(
                    None,
                    &ServerEvent::GameOver {
                        winner: outcome.winner.clone(),
                        message: format!("Game over! {} wins.", outcome.winner),
                    },
                );
                info!("session {session_id} won by {}", outcome.winner);
                entry.closed = true;
                return Ok(outcome);
            }

            entry.broadcast(
                Some(player_name),
                &ServerEvent::OtherPlayerGuess {
                    player: player_name.to_string(),
                    result: outcome.result,
                    next_player: outcome.next_player.clone(),
                    message: format!("{player_name} made a guess, it was {}.", outcome.result),
                },
            );
            entry.notify_next_turn();
            Ok(outcome)
        })
    }

    /// Attaches a connection to a participant, both for the first connection
    /// and after a drop.
    pub fn reconnect(
        &self,
        session_id: &str,
        player_name: &str,
        handle: ConnectionHandle,
    ) -> Result<(), RegistryError> {
        let player_name = player_name.trim();
        self.with_session(session_id, |entry, session_id| {
            let participant = entry
                .participant_mut(player_name)
                .ok_or_else(|| RegistryError::NotAMember(player_name.to_string()))?;
            if participant.handle.is_some() {
                return Err(RegistryError::AlreadyActive(player_name.to_string()));
            }
            participant.handle = Some(handle);

            entry.send_to(
                player_name,
                ServerEvent::Welcome {
                    session_id: session_id.to_string(),
                    player: player_name.to_string(),
                    message: format!("Welcome to {session_id}, {player_name}!"),
                },
            );
            info!("{player_name} connected to session {session_id}");

            if entry.game.is_running() && entry.game.player(player_name).is_some() {
                let progression = connectivity_changed(entry, player_name, true);
                let notified = if progression.starts_new_turn() {
                    entry.notify_next_turn()
                } else {
                    Vec::new()
                };
                if !notified.iter().any(|n| n == player_name) && entry.game.may_act(player_name)
                {
                    if let Some(player) = entry.game.player(player_name) {
                        entry.send_your_turn(player);
                    }
                }
            }
            Ok(())
        })
    }

    /// Detaches the connection of a participant. The session is dropped once
    /// nobody is connected and no game is running.
    pub fn disconnect(&self, session_id: &str, player_name: &str) -> Result<(), RegistryError> {
        self.with_session(session_id, |entry, session_id| {
            let participant = entry
                .participant_mut(player_name)
                .ok_or_else(|| RegistryError::NotAMember(player_name.to_string()))?;
            participant.handle = None;
            info!("{player_name} disconnected from session {session_id}");

            let progression = if entry.game.is_running() {
                connectivity_changed(entry, player_name, false)
            } else {
                Progression::default()
            };

            entry.broadcast(
                Some(player_name),
                &ServerEvent::PlayerLeft {
                    player: player_name.to_string(),
                },
            );
            if progression.starts_new_turn() {
                entry.notify_next_turn();
            }

            if entry.is_abandoned() {
                entry.closed = true;
            }
            Ok(())
        })
    }

    /// Passes a bearer credential to the session's music source.
    pub fn authenticate(&self, session_id: &str, access_token: &str) -> Result<(), RegistryError> {
        self.with_session(session_id, |entry, session_id| {
            entry.game.music_mut().authenticate(access_token)?;
            info!("music source of session {session_id} authenticated");
            Ok(())
        })
    }
}

/// Updates the connectivity of a player who is part of the running game.
fn connectivity_changed(
    entry: &mut SessionEntry,
    player_name: &str,
    connected: bool,
) -> Progression {
    match entry.game.set_connected(player_name, connected) {
        Ok(progression) => progression,
        Err(e) => {
            warn!("connectivity change of {player_name} not applied: {e}");
            Progression::default()
        }
    }
}
