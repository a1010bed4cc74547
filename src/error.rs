//! Error types for the chat server
//!
//! Defines connection-level errors plus the narrower errors raised by
//! the handshake, the session registry, peer writes, command parsing and
//! configuration loading. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Connection-level errors
///
/// Any of these ends the connection it occurred on. None of them affect
/// other sessions.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error, e.g. a line over the length limit (fatal)
    #[error("Line codec error: {0}")]
    Codec(#[from] tokio_util::codec::AnyDelimiterCodecError),

    /// Username handshake failed
    #[error("Malformed handshake: {0}")]
    Handshake(#[from] HandshakeError),

    /// Session could not be registered
    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Username handshake errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// Empty username line
    #[error("username is empty")]
    Empty,

    /// Username over the byte limit
    #[error("username is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Session registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry already holds `capacity` sessions
    #[error("server is full ({capacity} sessions)")]
    Full { capacity: usize },

    /// Server is draining; no new sessions accepted
    #[error("server is shutting down")]
    ShuttingDown,
}

/// Message send errors
///
/// Occurs when a message cannot be queued for a peer's writer task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer task has stopped
    #[error("Channel closed")]
    ChannelClosed,

    /// The peer is not draining its outbound queue
    #[error("Outbound queue full")]
    Backpressure,
}

/// Command syntax errors, reported to the issuing client only
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// `/whisper` without a recipient
    #[error("whisper without recipient")]
    MissingRecipient,

    /// `/whisper <username>` without a message body
    #[error("whisper without message")]
    MissingMessage,

    /// Unrecognized verb
    #[error("unknown command: {0}")]
    Unknown(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `ServerConfig`
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Port missing or zero
    #[error("port must be between 1 and 65535")]
    InvalidPort,

    /// Zero client capacity
    #[error("max clients must be positive")]
    InvalidMaxClients,
}
