//! The network runtime: sockets in, lines out.
//!
//! One task accepts connections per listening port; each connection gets a
//! read task and a write task.  Reads go through a fixed buffer and are
//! split on CR/LF here; everything after that is `State`'s business, and
//! nothing in this module keeps the state locked across an await point.

use crate::client::MessageQueueItem;
use crate::config::Config;
use crate::state::State;
use selka_tokens::Message;
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

/// Lifecycle requests raised by the DIE, RESTART and REHASH handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Stop,
    Restart,
    Rehash,
}

const READ_BUFFER_LEN: usize = 2048;
const BACKLOG: i32 = 20;
const SWEEP_PERIOD: Duration = Duration::from_secs(2);
const LINGER: Duration = Duration::from_secs(1);

/// Binds a listening socket on all IPv4 interfaces with the fixed accept
/// backlog.  `tokio`'s own `bind` leaves the backlog to the OS, so the
/// socket is set up by hand and handed over in non-blocking mode.
fn bind(port: u16) -> io::Result<std::net::TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = Socket::new(Domain::ipv4(), Type::stream(), None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    let listener = socket.into_tcp_listener();
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Splits incoming bytes into complete lines.
///
/// Lines longer than the limit are dropped silently, as are lines that are
/// not valid UTF-8; neither kills the connection.
struct LineSplitter {
    line: Vec<u8>,
    overflowed: bool,
    max_len: usize,
}

impl LineSplitter {
    fn new(max_len: usize) -> LineSplitter {
        LineSplitter {
            line: Vec::new(),
            overflowed: false,
            max_len,
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\r' || b == b'\n' {
                if !self.line.is_empty() && !self.overflowed {
                    match String::from_utf8(std::mem::take(&mut self.line)) {
                        Ok(line) => lines.push(line),
                        Err(_) => log::debug!("Dropped a line of invalid UTF-8"),
                    }
                }
                self.line.clear();
                self.overflowed = false;
            } else if self.line.len() < self.max_len {
                self.line.push(b);
            } else {
                self.overflowed = true;
            }
        }
        lines
    }
}

/// Runs the server: binds the listeners, then waits for a lifecycle
/// request.  RESTART re-enters the loop, re-reading the configuration and
/// re-binding the listeners; DIE returns.
pub async fn run(mut config: Config, config_path: String) -> io::Result<()> {
    loop {
        let restart = run_once(&config, &config_path).await?;
        if !restart {
            return Ok(());
        }
        log::info!("Restarting");
        match Config::from_file(&config_path) {
            Ok(reloaded) => config = reloaded,
            Err(err) => log::error!("Failed to reload {}: {}; keeping the old one", config_path, err),
        }
    }
}

async fn run_once(config: &Config, config_path: &str) -> io::Result<bool> {
    let (control, mut requests) = mpsc::unbounded_channel();
    let (shutdown, _) = broadcast::channel(1);
    let state = State::new(config.state(), control);

    for port in &config.ports {
        let listener = TcpListener::from_std(bind(*port)?)?;
        log::info!("Listening on 0.0.0.0:{}", port);
        tokio::spawn(listen(
            listener,
            state.clone(),
            config.max_line_length,
            shutdown.clone(),
        ));
    }
    tokio::spawn(sweep(state.clone(), shutdown.subscribe()));

    let restart = loop {
        match requests.recv().await {
            Some(Control::Stop) => break false,
            Some(Control::Restart) => break true,
            Some(Control::Rehash) => match Config::from_file(config_path) {
                Ok(reloaded) => state.rehash(reloaded.state()).await,
                Err(err) => log::error!("Failed to reload {}: {}", config_path, err),
            },
            None => break false,
        }
    };

    let _ = shutdown.send(());
    state.shutdown().await;
    Ok(restart)
}

async fn listen(mut listener: TcpListener, state: State, max_line_length: usize,
                shutdown: broadcast::Sender<()>)
{
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((conn, addr)) => {
                    tokio::spawn(handle_client(
                        conn,
                        addr,
                        state.clone(),
                        max_line_length,
                        shutdown.subscribe(),
                    ));
                }
                Err(err) => log::warn!("Failed to accept a connection: {}", err),
            },
            _ = stop.recv() => break,
        }
    }
}

async fn sweep(state: State, mut stop: broadcast::Receiver<()>) {
    let mut ticks = time::interval(SWEEP_PERIOD);
    loop {
        tokio::select! {
            _ = ticks.tick() => state.liveness_sweep().await,
            _ = stop.recv() => break,
        }
    }
}

async fn handle_client(conn: TcpStream, addr: SocketAddr, state: State, max_line_length: usize,
                       mut stop: broadcast::Receiver<()>)
{
    if let Err(err) = conn.set_linger(Some(LINGER)) {
        log::warn!("{}: Failed to set SO_LINGER: {}", addr, err);
    }
    let (mut reader, mut writer) = conn.into_split();

    let (queue, mut outgoing) = mpsc::unbounded_channel();
    let id = state.peer_joined(addr, queue).await;

    tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let msg: MessageQueueItem = msg;
            let bytes: &[u8] = msg.as_ref();
            if writer.write_all(bytes).await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; READ_BUFFER_LEN];
    let mut splitter = LineSplitter::new(max_line_length);
    let err = loop {
        tokio::select! {
            res = reader.read(&mut buf) => match res {
                Ok(0) => break None,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        let msg = match Message::parse(&line) {
                            Some(msg) => msg,
                            None => continue,
                        };
                        if !state.handle_message(id, msg).await {
                            // The client quit or was removed; its id may be
                            // reused, so this task must not touch it again.
                            return;
                        }
                    }
                }
                Err(err) => break Some(err),
            },
            _ = stop.recv() => return,
        }
    };
    state.peer_quit(id, err).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_splitter_frames_on_crlf() {
        let mut splitter = LineSplitter::new(512);
        assert_eq!(splitter.push(b"NICK alice\r\nUSER "), vec!["NICK alice".to_owned()]);
        assert_eq!(splitter.push(b"alice 0 * :A\r\n"), vec!["USER alice 0 * :A".to_owned()]);
    }

    #[test]
    fn test_line_splitter_suppresses_empties() {
        let mut splitter = LineSplitter::new(512);
        assert_eq!(
            splitter.push(b"\r\n\r\nPING a\r\rPING b\n\n"),
            vec!["PING a".to_owned(), "PING b".to_owned()]
        );
    }

    #[test]
    fn test_line_splitter_drops_oversize_lines() {
        let mut splitter = LineSplitter::new(8);
        let mut bytes = vec![b'x'; 32];
        bytes.extend_from_slice(b"\r\nPING a\r\n");
        assert_eq!(splitter.push(&bytes), vec!["PING a".to_owned()]);
    }

    #[test]
    fn test_line_splitter_drops_invalid_utf8() {
        let mut splitter = LineSplitter::new(512);
        assert_eq!(splitter.push(b"PING \xff\xfe\r\nPING ok\r\n"), vec!["PING ok".to_owned()]);
    }
}
