use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use ayaya_stream::{encode_message, Heartbeat, Hello, MessageKind, RenderSnapshot};
use log::{debug, info, warn};
use thiserror::Error;

use crate::display::DisplaySink;

/// Idle time after which the worker sends a heartbeat to the subscriber.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream worker disconnected")]
    Disconnected,
    #[error("message encode failed: {0}")]
    Encode(#[from] ayaya_stream::ProtocolError),
}

enum Command {
    Send(Vec<u8>),
    Shutdown,
}

/// Pushes overlay snapshots to a single connected display surface.
pub struct StreamServer {
    sender: Sender<Command>,
    local_addr: SocketAddr,
    start: Instant,
    seq: AtomicU64,
}

impl StreamServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, build: Option<String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).context("binding stream socket")?;
        listener
            .set_nonblocking(true)
            .context("setting stream listener non-blocking")?;
        let local_addr = listener
            .local_addr()
            .context("reading stream socket address")?;
        let (tx, rx) = mpsc::channel();
        let build_info = build.unwrap_or_else(|| "dev".to_string());
        let start = Instant::now();
        thread::Builder::new()
            .name("ayaya_stream".to_string())
            .spawn(move || worker_loop(listener, rx, build_info, start))
            .context("spawning stream worker thread")?;
        info!("[ayaya_engine::stream] overlay stream listening on {local_addr}");
        Ok(Self {
            sender: tx,
            local_addr,
            start,
            seq: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn send_render_snapshot(&self, mut snapshot: RenderSnapshot) -> Result<(), StreamError> {
        snapshot.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if snapshot.host_time_ns == 0 {
            snapshot.host_time_ns = self.start.elapsed().as_nanos() as u64;
        }
        let bytes = encode_message(MessageKind::RenderSnapshot, &snapshot)?;
        self.sender
            .send(Command::Send(bytes))
            .map_err(|_| StreamError::Disconnected)
    }
}

impl DisplaySink for StreamServer {
    fn publish(&self, snapshot: RenderSnapshot) {
        if let Err(err) = self.send_render_snapshot(snapshot) {
            warn!("[ayaya_engine::stream] dropping snapshot: {err}");
        }
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn worker_loop(listener: TcpListener, rx: Receiver<Command>, build_info: String, start: Instant) {
    let mut stream: Option<TcpStream> = None;
    let mut last_write = Instant::now();
    loop {
        match rx.recv_timeout(Duration::from_millis(16)) {
            Ok(Command::Send(buffer)) => {
                if let Some(conn) = stream.as_mut() {
                    if let Err(err) = write_all(conn, &buffer) {
                        warn!("[ayaya_engine::stream] send failed: {err}; waiting for reconnect");
                        stream = None;
                    } else {
                        last_write = Instant::now();
                    }
                }
            }
            Ok(Command::Shutdown) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if let Some(conn) = stream.as_mut() {
            if last_write.elapsed() >= HEARTBEAT_INTERVAL {
                let heartbeat = Heartbeat {
                    host_time_ns: start.elapsed().as_nanos() as u64,
                };
                match send_message(conn, MessageKind::Heartbeat, &heartbeat) {
                    Ok(()) => last_write = Instant::now(),
                    Err(err) => {
                        debug!("[ayaya_engine::stream] heartbeat failed: {err}");
                        stream = None;
                    }
                }
            }
        }

        if stream.is_none() {
            match listener.accept() {
                Ok((mut conn, addr)) => {
                    if let Err(err) = prepare_connection(&conn) {
                        warn!("[ayaya_engine::stream] failed to configure connection from {addr}: {err}");
                        continue;
                    }
                    let hello = Hello::new("ayaya_engine", Some(build_info.clone()));
                    match send_message(&mut conn, MessageKind::Hello, &hello) {
                        Ok(()) => {
                            info!("[ayaya_engine::stream] display connected from {addr}");
                            last_write = Instant::now();
                            stream = Some(conn);
                        }
                        Err(err) => {
                            warn!("[ayaya_engine::stream] handshake error with {addr}: {err}");
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!("[ayaya_engine::stream] accept error: {err}");
                    thread::sleep(Duration::from_millis(200));
                }
            }
        }
    }
    debug!("[ayaya_engine::stream] worker exiting");
}

fn prepare_connection(conn: &TcpStream) -> io::Result<()> {
    // Accepted sockets may inherit the listener's non-blocking flag.
    conn.set_nonblocking(false)?;
    conn.set_nodelay(true)
}

fn send_message<T: serde::Serialize>(
    stream: &mut TcpStream,
    kind: MessageKind,
    payload: &T,
) -> io::Result<()> {
    let message = encode_message(kind, payload).map_err(io::Error::other)?;
    write_all(stream, &message)
}

fn write_all(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "remote closed connection",
                ))
            }
            Ok(written) => offset += written,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
