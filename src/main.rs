use crate::cli::run;

pub mod channel;
pub mod cli;
mod config;
pub mod domain;
pub mod game;
pub mod http;
pub mod music;
pub mod registry;

fn main() {
    run();
}
