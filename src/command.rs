//! In-band command parsing and dispatch
//!
//! A command line starts with `/`. The verb is the first whitespace-delimited
//! token, matched case-sensitively. Replies go to the issuing session only,
//! except a whisper, which goes to its single named recipient.

use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::message::ServerMessage;
use crate::server::ServerHandle;
use crate::session::Session;

/// Parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/help`
    Help,
    /// `/list`
    List,
    /// `/whisper <recipient> <message...>`
    Whisper { recipient: String, message: String },
    /// `/exit`
    Exit,
}

impl Command {
    /// Parse a line already known to start with the command prefix
    ///
    /// Trailing arguments to `/help`, `/list` and `/exit` are ignored.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (line, ""),
        };

        match verb {
            "/help" => Ok(Command::Help),
            "/list" => Ok(Command::List),
            "/exit" => Ok(Command::Exit),
            "/whisper" => parse_whisper(rest),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Help => "/help",
            Command::List => "/list",
            Command::Whisper { .. } => "/whisper",
            Command::Exit => "/exit",
        }
    }
}

fn parse_whisper(args: &str) -> Result<Command, CommandError> {
    if args.is_empty() {
        return Err(CommandError::MissingRecipient);
    }
    let Some((recipient, message)) = args.split_once(char::is_whitespace) else {
        return Err(CommandError::MissingMessage);
    };
    let message = message.trim_start();
    if message.is_empty() {
        return Err(CommandError::MissingMessage);
    }
    Ok(Command::Whisper {
        recipient: recipient.to_string(),
        message: message.to_string(),
    })
}

/// What the connection handler does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading lines
    Continue,
    /// Move to closing; the handler unregisters and closes
    Exit,
}

/// Execute one command line for `session`
pub async fn dispatch(session: &Session, line: &str, server: &ServerHandle) -> Flow {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            info!("Rejected command from {}: {}", session.username, e);
            reply(session, e.into());
            return Flow::Continue;
        }
    };

    info!("Command '{}' used by {}", command.verb(), session.username);

    match command {
        Command::Help => reply(session, ServerMessage::Help),
        Command::List => {
            let others: Vec<String> = server
                .list_usernames()
                .await
                .into_iter()
                .filter(|(id, _)| *id != session.id)
                .map(|(_, name)| name)
                .collect();
            if others.is_empty() {
                reply(session, ServerMessage::NoUsers);
            } else {
                reply(session, ServerMessage::UserList(others));
            }
        }
        Command::Whisper { recipient, message } => {
            whisper(session, &recipient, message, server).await;
        }
        Command::Exit => return Flow::Exit,
    }

    Flow::Continue
}

async fn whisper(session: &Session, recipient: &str, message: String, server: &ServerHandle) {
    let Some(target) = server.find_by_username(recipient).await else {
        reply(session, ServerMessage::RecipientNotFound);
        return;
    };

    let whisper = ServerMessage::Whisper {
        from: session.username.to_string(),
        content: message,
    };
    match target.send(whisper) {
        Ok(()) => debug!("Whisper {} -> {}", session.id, target.id),
        Err(e) => {
            warn!("Whisper to {} failed: {}", target.id, e);
            reply(session, ServerMessage::RecipientNotFound);
        }
    }
}

fn reply(session: &Session, msg: ServerMessage) {
    if let Err(e) = session.send(msg) {
        debug!("Reply to {} dropped: {}", session.id, e);
    }
}
