//! Per-player duplex channel: guesses flow in, game events flow out.

pub mod framing;
pub mod message;
mod server;

pub use server::{ChannelHandle, start_channel};
