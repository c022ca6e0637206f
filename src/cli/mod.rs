use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    channel::start_channel,
    config::Config,
    http::server::HttpServer,
    music::MusicSourceFactory,
    registry::SessionRegistry,
};

mod play;

pub use play::PlayArgs;

#[derive(Parser)]
#[command(name = "trackback")]
#[command(version = "0.1")]
#[command(about = "Multiplayer music timeline guessing game")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the game server: session endpoints and the player channel
    Serve {
        /// Path to the config TOML file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Join a game from the terminal
    Play(PlayArgs),
}

/// Entrypoint for CLI
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Serve { config } => serve(config),
        Commands::Play(args) => play::play(args),
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn serve(config_path: &Path) -> anyhow::Result<()> {
    let cfg = Config::load(config_path)?;
    info!(
        "loaded config version {} from {}",
        cfg.version,
        config_path.display()
    );

    let sources =
        MusicSourceFactory::from_config(&cfg.music).context("Invalid [music] configuration")?;
    let registry = Arc::new(SessionRegistry::new(sources));

    let (channel, _) = start_channel(Arc::clone(&registry), &cfg.channel).with_context(|| {
        format!(
            "Failed to start player channel on {}:{}",
            cfg.channel.bind_addr, cfg.channel.port
        )
    })?;

    HttpServer::new(registry, cfg.game, cfg.http).run();
    channel.stop();
    Ok(())
}
