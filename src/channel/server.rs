//! TCP server for the per-player channel.
//!
//! - **Listener thread**: non-blocking `accept()` loop that checks the
//!   `keep_running` flag between polls and spawns one thread per connection.
//! - **Connection thread**: reads the `Hello` handshake, attaches the player to
//!   the session through the registry, then reads guesses until `Goodbye`, EOF
//!   or a read error. Detaches the player when it returns.
//! - **Writer thread** (one per connection): drains the connection's event
//!   queue onto the socket. The registry only ever holds the `Sender`, so
//!   sessions never write to sockets while their lock is held.
//!
//! When the last sender of a queue is gone the writer shuts the socket down,
//! which also ends a reader blocked on it.

use std::{
    io::{self, BufReader, BufWriter},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::{
    config::ChannelConfig,
    registry::{ConnectionHandle, RegistryError, SessionRegistry},
};

use super::{
    framing::{read_message, write_message},
    message::{ClientMessage, ServerEvent},
};

const HELLO_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Handle returned by `start_channel` to control the running listener.
pub struct ChannelHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ChannelHandle {
    /// Stops accepting connections and waits for the listener to exit.
    /// Established connections run until their peers leave.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Binds the channel listener and serves it on a background thread. Returns
/// the bound address, which differs from the config when port 0 is used.
pub fn start_channel(
    registry: Arc<SessionRegistry>,
    config: &ChannelConfig,
) -> io::Result<(ChannelHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_listener = Arc::clone(&keep_running);
    let thread = thread::spawn(move || accept_loop(listener, registry, keep_running_listener));

    info!("player channel listening on {addr}");
    Ok((
        ChannelHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn accept_loop(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("channel connection from {peer}");
                let registry = Arc::clone(&registry);
                let keep_running = Arc::clone(&keep_running);
                thread::spawn(move || {
                    if let Err(e) = serve_connection(stream, &registry, &keep_running) {
                        debug!("connection from {peer} ended: {e}");
                    }
                });
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                error!("player channel stopped accepting: {e}");
                break;
            }
        }
    }
}

fn serve_connection(
    stream: TcpStream,
    registry: &SessionRegistry,
    keep_running: &AtomicBool,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HELLO_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let (events, queue) = mpsc::channel();
    let writer = spawn_writer(stream.try_clone()?, queue);

    let (session_id, player_name) = match read_message(&mut reader) {
        Ok(Some(ClientMessage::Hello {
            session_id,
            player_name,
        })) => (session_id, player_name),
        Ok(Some(_)) => {
            return reject(events, writer, "expected hello as first message".into());
        }
        Ok(None) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return reject(events, writer, format!("malformed hello: {e}"));
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = registry.reconnect(&session_id, &player_name, events.clone()) {
        info!("{player_name} refused on session {session_id}: {e}");
        return reject(events, writer, e.to_string());
    }

    stream.set_read_timeout(None)?;
    let result = reader_loop(
        &mut reader,
        registry,
        &session_id,
        &player_name,
        &events,
        keep_running,
    );

    match registry.disconnect(&session_id, &player_name) {
        Ok(()) => {}
        // the game ended and took the session with it
        Err(RegistryError::SessionNotFound(_)) => {
            debug!("session {session_id} already gone when {player_name} left")
        }
        Err(e) => warn!("could not detach {player_name} from {session_id}: {e}"),
    }

    drop(events);
    let _ = writer.join();
    result
}

fn reject(
    events: ConnectionHandle,
    writer: thread::JoinHandle<()>,
    reason: String,
) -> io::Result<()> {
    let _ = events.send(ServerEvent::Rejected { reason });
    drop(events);
    let _ = writer.join();
    Ok(())
}

fn reader_loop(
    reader: &mut BufReader<TcpStream>,
    registry: &SessionRegistry,
    session_id: &str,
    player_name: &str,
    events: &ConnectionHandle,
    keep_running: &AtomicBool,
) -> io::Result<()> {
    let refuse = |message: String| {
        let _ = events.send(ServerEvent::Error { message });
    };

    while keep_running.load(Ordering::SeqCst) {
        match read_message(reader) {
            Ok(Some(ClientMessage::Guess { index })) => {
                if let Err(e) = registry.submit_guess(session_id, player_name, index) {
                    debug!("guess of {player_name} in {session_id} refused: {e}");
                    refuse(e.to_string());
                }
            }
            Ok(Some(ClientMessage::Hello { .. })) => {
                refuse("already connected".into());
            }
            Ok(Some(ClientMessage::Goodbye)) | Ok(None) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                refuse(format!("malformed message: {e}"));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn spawn_writer(stream: TcpStream, queue: Receiver<ServerEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut writer = BufWriter::new(&stream);
        for event in queue {
            if let Err(e) = write_message(&mut writer, &event) {
                debug!("dropping connection, write failed: {e}");
                break;
            }
        }
        drop(writer);
        let _ = stream.shutdown(Shutdown::Both);
    })
}
