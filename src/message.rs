//! Message protocol definitions
//!
//! Line-oriented text protocol. Each inbound line is classified as chat,
//! a command or a blank line; each outbound message renders to one or
//! more newline-terminated lines through `Display`.

use std::fmt;

use crate::error::{CommandError, HandshakeError, RegistryError};

/// First byte marking a line as a command
pub const COMMAND_PREFIX: char = '/';

/// Client → Server line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Whitespace-only line, ignored
    Blank,
    /// Line starting with the command prefix
    Command(String),
    /// Anything else, broadcast to the room
    Chat(String),
}

impl ClientMessage {
    /// Classify one received line (already stripped of its line ending)
    ///
    /// Only a line whose very first byte is the prefix is a command;
    /// `alice: /list` is chat.
    pub fn parse(line: &str) -> Self {
        if line.trim().is_empty() {
            ClientMessage::Blank
        } else if line.starts_with(COMMAND_PREFIX) {
            ClientMessage::Command(line.to_string())
        } else {
            ClientMessage::Chat(line.to_string())
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Chat line from another participant
    Chat { from: String, content: String },
    /// Directed message from another participant
    Whisper { from: String, content: String },
    /// Usage text
    Help,
    /// Other connected participants
    UserList(Vec<String>),
    /// Nobody else is connected
    NoUsers,
    /// Whisper target does not exist
    RecipientNotFound,
    /// `/whisper` missing its recipient
    WhisperUsage,
    /// `/whisper` missing its message body
    WhisperMissingMessage,
    /// Unrecognized command
    UnknownCommand,
    /// Registration refused at capacity
    ServerFull,
    /// Handshake rejected
    InvalidUsername,
    /// Sent to everyone right before the server closes their connection
    ShuttingDown,
}

pub const HELP_TEXT: &str = "Help commands:\n\
    /help - Show this help message\n\
    /list - List connected users\n\
    /whisper <username> <message> - Send a private message\n\
    /exit - Disconnect from the chat\n";

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Chat { from, content } => writeln!(f, "{}: {}", from, content),
            ServerMessage::Whisper { from, content } => {
                writeln!(f, "[Whisper from {}]: {}", from, content)
            }
            ServerMessage::Help => f.write_str(HELP_TEXT),
            ServerMessage::UserList(names) => {
                f.write_str("Connected users:\n")?;
                for name in names {
                    writeln!(f, "{}", name)?;
                }
                Ok(())
            }
            ServerMessage::NoUsers => f.write_str("No users connected.\n"),
            ServerMessage::RecipientNotFound => f.write_str("Recipient not found.\n"),
            ServerMessage::WhisperUsage => {
                f.write_str("Whisper command format: /whisper <username> <message>\n")
            }
            ServerMessage::WhisperMissingMessage => f.write_str("No message specified.\n"),
            ServerMessage::UnknownCommand => f.write_str("Unknown command.\n"),
            ServerMessage::ServerFull => f.write_str("Server is full. Try again later.\n"),
            ServerMessage::InvalidUsername => f.write_str("Invalid username.\n"),
            ServerMessage::ShuttingDown => f.write_str("Server is shutting down.\n"),
        }
    }
}

/// Convert CommandError to the reply sent to the issuing client
impl From<CommandError> for ServerMessage {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::MissingRecipient => ServerMessage::WhisperUsage,
            CommandError::MissingMessage => ServerMessage::WhisperMissingMessage,
            CommandError::Unknown(_) => ServerMessage::UnknownCommand,
        }
    }
}

impl From<RegistryError> for ServerMessage {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full { .. } => ServerMessage::ServerFull,
            RegistryError::ShuttingDown => ServerMessage::ShuttingDown,
        }
    }
}

impl From<HandshakeError> for ServerMessage {
    fn from(_: HandshakeError) -> Self {
        ServerMessage::InvalidUsername
    }
}
