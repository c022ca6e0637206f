//! Terminal client: joins a session over HTTP, then plays on the channel.

use anyhow::{Context, bail};
use clap::Args;
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};
use std::{
    io::{self, BufRead, BufReader, Write},
    net::TcpStream,
};

use crate::{
    channel::{
        framing::{read_message, write_message},
        message::{ClientMessage, ServerEvent},
    },
    domain::track::Track,
};

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Host running `trackback serve`
    #[arg(long, default_value = "127.0.0.1")]
    pub server: String,

    #[arg(long, default_value_t = 8080)]
    pub http_port: u16,

    #[arg(long, default_value_t = 8081)]
    pub channel_port: u16,

    /// Session to join
    #[arg(long)]
    pub session: String,

    /// Player name
    #[arg(long)]
    pub name: String,

    /// Create the session first
    #[arg(long)]
    pub create: bool,

    /// Tracks needed to win, when creating
    #[arg(long)]
    pub target: Option<usize>,

    /// `sequential` or `simultaneous`, when creating
    #[arg(long)]
    pub mode: Option<String>,

    /// `mock` or `spotify`, when creating
    #[arg(long)]
    pub source: Option<String>,

    /// Music service access token
    #[arg(long)]
    pub token: Option<String>,

    /// Start the game once connected
    #[arg(long)]
    pub start: bool,
}

pub fn play(args: &PlayArgs) -> anyhow::Result<()> {
    let http = Client::new();
    let base = format!("http://{}:{}", args.server, args.http_port);

    if args.create {
        post(
            &http,
            &format!("{base}/create"),
            json!({
                "session_id": args.session,
                "target_count": args.target,
                "mode": args.mode,
                "source": args.source,
                "access_token": args.token,
            }),
        )?;
        println!("Created session {}", args.session);
    } else if let Some(token) = &args.token {
        post(
            &http,
            &format!("{base}/authenticate"),
            json!({ "session_id": args.session, "access_token": token }),
        )?;
    }

    // joining twice fails, connecting again is still fine
    if let Err(e) = post(
        &http,
        &format!("{base}/join"),
        json!({ "session_id": args.session, "player_name": args.name }),
    ) {
        warn!("{e:#}, connecting anyway");
    }

    let stream = TcpStream::connect((args.server.as_str(), args.channel_port))
        .with_context(|| format!("Failed to connect to {}:{}", args.server, args.channel_port))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    write_message(
        &mut writer,
        &ClientMessage::Hello {
            session_id: args.session.clone(),
            player_name: args.name.clone(),
        },
    )?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut turn = TurnState::default();

    while let Some(event) = read_message::<_, ServerEvent>(&mut reader)? {
        debug!("event: {event:?}");
        match event {
            ServerEvent::Welcome { message, .. } => {
                println!("{message}");
                if args.start {
                    let response = post(
                        &http,
                        &format!("{base}/start"),
                        json!({ "session_id": args.session }),
                    )?;
                    debug!("start: {}", response.text().unwrap_or_default());
                }
            }
            ServerEvent::Rejected { reason } => bail!("Connection rejected: {reason}"),
            ServerEvent::PlayerJoined { player } => println!("{player} joined"),
            ServerEvent::GameStarted {
                players,
                mode,
                target_count,
            } => println!(
                "Game started ({mode}): {}. First to {target_count} tracks wins.",
                players.join(", ")
            ),
            ServerEvent::YourTurn {
                tracks, message, ..
            } => {
                println!("{message}");
                turn.your_turn(tracks);
            }
            ServerEvent::GuessResult(outcome) => {
                turn.answered();
                println!("Your guess was {}: {}", outcome.result, outcome.track);
                print_timeline(&outcome.tracks);
                for other in &outcome.other_players {
                    println!("  {} has {} tracks", other.name, other.track_count());
                }
            }
            ServerEvent::OtherPlayerGuess { message, .. } => println!("{message}"),
            ServerEvent::PlayerLeft { player } => println!("{player} left"),
            ServerEvent::GameOver { message, .. } => {
                println!("{message}");
                write_message(&mut writer, &ClientMessage::Goodbye)?;
                return Ok(());
            }
            ServerEvent::Error { message } => {
                println!("Error: {message}");
                turn.refused();
            }
        }

        if let Some(tracks) = turn.owed() {
            print_timeline(tracks);
            match prompt_index(&mut input, tracks.len())? {
                Some(index) => {
                    write_message(&mut writer, &ClientMessage::Guess { index })?;
                    turn.sent();
                }
                None => {
                    write_message(&mut writer, &ClientMessage::Goodbye)?;
                    return Ok(());
                }
            }
        }
    }

    println!("Server closed the connection");
    Ok(())
}

/// Whether the player owes a guess, so every `your_turn` is answered once.
#[derive(Debug, Default)]
struct TurnState {
    /// timeline of a `your_turn` not answered yet
    owed: Option<Vec<Track>>,
    /// timeline of a guess waiting for its result
    in_flight: Option<Vec<Track>>,
}

impl TurnState {
    fn your_turn(&mut self, tracks: Vec<Track>) {
        self.owed = Some(tracks);
    }

    fn owed(&self) -> Option<&[Track]> {
        self.owed.as_deref()
    }

    fn sent(&mut self) {
        self.in_flight = self.owed.take();
    }

    fn answered(&mut self) {
        self.in_flight = None;
    }

    /// the server refused the guess, ask again
    fn refused(&mut self) {
        if let Some(tracks) = self.in_flight.take() {
            self.owed = Some(tracks);
        }
    }
}

fn post(http: &Client, url: &str, body: Value) -> anyhow::Result<Response> {
    let response = http
        .post(url)
        .json(&body)
        .send()
        .with_context(|| format!("Failed to reach {url}"))?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let message = response
        .json::<Value>()
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    bail!("{url}: {message}")
}

fn print_timeline(tracks: &[Track]) {
    println!("Your timeline:");
    println!("  [0]");
    for (i, track) in tracks.iter().enumerate() {
        println!("      {track}");
        println!("  [{}]", i + 1);
    }
}

/// Asks where the playing track belongs. `None` means the player quit.
fn prompt_index(input: &mut impl BufRead, len: usize) -> anyhow::Result<Option<i64>> {
    loop {
        print!("Where does the playing track go? (0-{len}, q to quit) ");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_index(&line, len) {
            Some(Ok(index)) => return Ok(Some(index)),
            Some(Err(msg)) => println!("{msg}"),
            None => return Ok(None),
        }
    }
}

fn parse_index(line: &str, len: usize) -> Option<Result<i64, String>> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return None;
    }
    Some(match line.parse::<i64>() {
        Ok(index) if (0..=len as i64).contains(&index) => Ok(index),
        Ok(_) => Err(format!("Pick a slot between 0 and {len}")),
        Err(_) => Err("Not a number".to_string()),
    })
}
