//! Session struct definition
//!
//! Represents a registered participant: identity, username and the
//! queue feeding its connection's writer task.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{SessionId, Username};

/// Item queued for a connection's writer task
#[derive(Debug)]
pub enum Outbound {
    /// Render and write a message
    Message(ServerMessage),
    /// Stop writing and shut down the write half
    Close,
}

/// Registered chat participant
///
/// Cloning a session clones the queue handle, not the connection. The
/// writer task behind the queue is the only writer of the socket.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Username chosen during the handshake
    pub username: Username,
    /// Peer address
    pub addr: SocketAddr,
    /// Server → writer task queue
    sender: mpsc::Sender<Outbound>,
}

impl Session {
    /// Create a session with the given identity and writer queue
    pub fn new(
        id: SessionId,
        username: Username,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            username,
            addr,
            sender,
        }
    }

    /// Queue a message for this session
    ///
    /// Never waits: a peer that stopped reading must not stall the
    /// registry or other senders.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .try_send(Outbound::Message(msg))
            .map_err(into_send_error)
    }

    /// Ask the writer task to close the connection
    ///
    /// Safe to call more than once; later calls report `ChannelClosed`.
    pub fn close(&self) -> Result<(), SendError> {
        self.sender.try_send(Outbound::Close).map_err(into_send_error)
    }

    /// Get the display name for this session
    pub fn display_name(&self) -> &str {
        self.username.as_str()
    }
}

fn into_send_error<T>(err: TrySendError<T>) -> SendError {
    match err {
        TrySendError::Full(_) => SendError::Backpressure,
        TrySendError::Closed(_) => SendError::ChannelClosed,
    }
}
