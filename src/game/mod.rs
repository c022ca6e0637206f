//! The game itself: guess validation, turn strategies and the session state machine.

pub mod error;
pub mod session;
pub mod strategy;
pub mod validator;

pub use error::GameError;
pub use session::{GameSession, GuessOutcome, GuessResult};
pub use strategy::{GameMode, Progression, TurnStrategy};
