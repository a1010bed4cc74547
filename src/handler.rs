//! Connection handler
//!
//! Drives one connection through `AwaitingHandshake → Active → Closing →
//! Closed`. Reads are split on `\n`, decoded lossily as UTF-8, and observe
//! the shutdown token; writes go through a dedicated writer task fed by the session's
//! outbound queue.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{self, Flow};
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerHandle;
use crate::session::{Outbound, Session};
use crate::types::{SessionId, Username};

/// Longest accepted line in bytes, excluding the line ending
pub const MAX_LINE_LENGTH: usize = 1024;

/// Outbound queue depth per connection
pub const OUTBOUND_BUFFER_SIZE: usize = 64;

/// How long teardown waits for the writer to flush
pub const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Newline-delimited byte reader; decoding happens per line
type LineReader<R> = FramedRead<R, AnyDelimiterCodec>;

/// Result of waiting for the next line
#[derive(Debug)]
enum Inbound {
    Line(String),
    Eof,
    Cancelled,
}

/// Why a connection left the Active state
#[derive(Debug)]
enum Disconnect {
    Eof,
    Exit,
    Cancelled,
}

/// Connection state
enum State {
    AwaitingHandshake,
    Active(Session),
    Closing(Option<SessionId>),
    Closed,
}

/// Handle an accepted TCP connection
pub async fn handle_connection(
    stream: TcpStream,
    server: ServerHandle,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();
    handle_stream(reader, writer, peer_addr, server, cancel).await
}

/// Run the connection state machine over any split byte stream
///
/// Every exit path passes through Closing: the session is unregistered
/// (if it was registered) and the writer is drained and shut down.
pub async fn handle_stream<R, W>(
    reader: R,
    writer: W,
    peer_addr: SocketAddr,
    server: ServerHandle,
    cancel: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    debug!("New connection from {}", peer_addr);

    let codec =
        AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), MAX_LINE_LENGTH);
    let mut lines = FramedRead::new(reader, codec);
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
    let mut write_task = tokio::spawn(write_loop(writer, out_rx));

    let mut result = Ok(());
    let mut state = State::AwaitingHandshake;

    loop {
        state = match state {
            State::AwaitingHandshake => {
                match handshake(&mut lines, &cancel, peer_addr, &out_tx, &server).await {
                    Ok(Some(session)) => State::Active(session),
                    Ok(None) => State::Closing(None),
                    Err(e) => {
                        result = Err(e);
                        State::Closing(None)
                    }
                }
            }
            State::Active(session) => {
                let id = session.id;
                match run_session(&session, &mut lines, &cancel, &server).await {
                    Ok(reason) => {
                        info!("{} ({}) disconnected: {:?}", session.username, id, reason);
                    }
                    Err(e) => {
                        warn!("{} ({}) dropped: {}", session.username, id, e);
                        result = Err(e);
                    }
                }
                State::Closing(Some(id))
            }
            State::Closing(id) => {
                if let Some(id) = id {
                    server.unregister(id).await;
                }
                close(&out_tx, &mut write_task).await;
                State::Closed
            }
            State::Closed => break,
        };
    }

    debug!("Connection from {} closed", peer_addr);
    result
}

/// Read the username line and register the session
///
/// `Ok(None)` means the peer went away or was rejected; nothing was
/// registered.
async fn handshake<R>(
    lines: &mut LineReader<R>,
    cancel: &CancellationToken,
    peer_addr: SocketAddr,
    out_tx: &mpsc::Sender<Outbound>,
    server: &ServerHandle,
) -> Result<Option<Session>, AppError>
where
    R: AsyncRead + Unpin,
{
    let line = match next_line(lines, cancel).await {
        Ok(Inbound::Line(line)) => line,
        Ok(Inbound::Eof | Inbound::Cancelled) => return Ok(None),
        Err(AppError::Codec(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
            warn!("Rejected handshake from {}: username line too long", peer_addr);
            notify(out_tx, ServerMessage::InvalidUsername);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let username = match Username::parse(&line) {
        Ok(username) => username,
        Err(e) => {
            warn!("Rejected handshake from {}: {}", peer_addr, e);
            notify(out_tx, e.into());
            return Ok(None);
        }
    };

    let session = Session::new(SessionId::next(), username, peer_addr, out_tx.clone());
    match server.register(session.clone()).await {
        Ok(()) => Ok(Some(session)),
        Err(e) => {
            warn!("Rejected {} from {}: {}", session.username, peer_addr, e);
            notify(out_tx, e.into());
            Ok(None)
        }
    }
}

/// Active loop: broadcast chat, dispatch commands
async fn run_session<R>(
    session: &Session,
    lines: &mut LineReader<R>,
    cancel: &CancellationToken,
    server: &ServerHandle,
) -> Result<Disconnect, AppError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let line = match next_line(lines, cancel).await? {
            Inbound::Line(line) => line,
            Inbound::Eof => return Ok(Disconnect::Eof),
            Inbound::Cancelled => return Ok(Disconnect::Cancelled),
        };

        match ClientMessage::parse(&line) {
            ClientMessage::Blank => {}
            ClientMessage::Chat(content) => {
                debug!("Chat from {}", session.id);
                let message = ServerMessage::Chat {
                    from: session.username.to_string(),
                    content,
                };
                server.broadcast(session.id, message).await;
            }
            ClientMessage::Command(line) => {
                if command::dispatch(session, &line, server).await == Flow::Exit {
                    return Ok(Disconnect::Exit);
                }
            }
        }
    }
}

/// Wait for the next line or the shutdown signal
async fn next_line<R>(
    lines: &mut LineReader<R>,
    cancel: &CancellationToken,
) -> Result<Inbound, AppError>
where
    R: AsyncRead + Unpin,
{
    tokio::select! {
        _ = cancel.cancelled() => Ok(Inbound::Cancelled),
        next = lines.next() => match next {
            Some(Ok(chunk)) => Ok(Inbound::Line(decode_line(&chunk))),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Inbound::Eof),
        },
    }
}

/// Decode one received line, replacing invalid UTF-8 and dropping a `\r`
fn decode_line(chunk: &[u8]) -> String {
    let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    String::from_utf8_lossy(chunk).into_owned()
}

/// Queue a message on the connection's own writer
fn notify(out_tx: &mpsc::Sender<Outbound>, msg: ServerMessage) {
    let _ = out_tx.try_send(Outbound::Message(msg));
}

/// Stop the writer after it flushes what is queued
///
/// Idempotent with the shutdown path: if the writer already stopped on
/// its own `Close`, the request fails immediately and the join returns.
async fn close(out_tx: &mpsc::Sender<Outbound>, write_task: &mut JoinHandle<()>) {
    let drained = tokio::time::timeout(WRITER_DRAIN_TIMEOUT, async {
        let _ = out_tx.send(Outbound::Close).await;
        let _ = (&mut *write_task).await;
    })
    .await;

    if drained.is_err() {
        warn!("Writer did not drain in time, aborting");
        write_task.abort();
    }
}

/// Writer task: the only writer of the connection
async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Message(msg) => {
                if let Err(e) = writer.write_all(msg.to_string().as_bytes()).await {
                    debug!("Write failed, ending writer: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }

    let _ = writer.shutdown().await;
}
