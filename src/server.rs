//! ChatServer Actor implementation
//!
//! The central actor that owns the session registry. Handlers reach it
//! through `ServerHandle`, which wraps the command channel; replies come
//! back on oneshot channels.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::message::ServerMessage;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::types::SessionId;

/// Channel buffer size for server commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Add a session that completed its handshake
    Register {
        session: Session,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    /// Remove a session (no-op if already gone)
    Unregister { id: SessionId },
    /// Deliver a message to everyone but the sender
    Broadcast {
        from: SessionId,
        message: ServerMessage,
    },
    /// Snapshot of registered usernames
    ListUsernames {
        reply: oneshot::Sender<Vec<(SessionId, String)>>,
    },
    /// Look up the first session with this username
    FindByUsername {
        username: String,
        reply: oneshot::Sender<Option<Session>>,
    },
    /// Notify and close every session, then refuse new registrations
    Shutdown { reply: oneshot::Sender<usize> },
}

/// The main ChatServer actor
///
/// Processes commands one at a time, which makes it the registry's single
/// consistency boundary.
pub struct ChatServer {
    /// Active sessions
    registry: SessionRegistry,
    /// Set once shutdown has drained the registry
    shutting_down: bool,
    /// Log message content
    verbose: bool,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given capacity and command receiver
    pub fn new(max_clients: usize, verbose: bool, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: SessionRegistry::new(max_clients),
            shutting_down: false,
            verbose,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!(
            "ChatServer started (capacity {})",
            self.registry.capacity()
        );

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer stopped");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Register { session, reply } => {
                let result = self.handle_register(session);
                let _ = reply.send(result);
            }
            ServerCommand::Unregister { id } => {
                self.handle_unregister(id);
            }
            ServerCommand::Broadcast { from, message } => {
                self.handle_broadcast(from, message);
            }
            ServerCommand::ListUsernames { reply } => {
                let _ = reply.send(self.registry.list_usernames());
            }
            ServerCommand::FindByUsername { username, reply } => {
                let found = self.registry.find_by_username(&username).cloned();
                let _ = reply.send(found);
            }
            ServerCommand::Shutdown { reply } => {
                let notified = self.handle_shutdown();
                let _ = reply.send(notified);
            }
        }
    }

    /// Handle session registration
    fn handle_register(&mut self, session: Session) -> Result<(), RegistryError> {
        if self.shutting_down {
            return Err(RegistryError::ShuttingDown);
        }

        let id = session.id;
        let username = session.username.clone();
        let addr = session.addr;
        self.registry.register(session)?;

        info!("Session {} registered as '{}' from {}", id, username, addr);
        debug!(
            "Active sessions: {}/{}",
            self.registry.len(),
            self.registry.capacity()
        );
        Ok(())
    }

    /// Handle session removal
    fn handle_unregister(&mut self, id: SessionId) {
        match self.registry.unregister(id) {
            Some(session) => {
                info!(
                    "Session {} ('{}' from {}) unregistered",
                    id, session.username, session.addr
                );
                debug!(
                    "Active sessions: {}/{}",
                    self.registry.len(),
                    self.registry.capacity()
                );
            }
            None => debug!("Session {} already unregistered", id),
        }
    }

    /// Handle broadcast from one session
    fn handle_broadcast(&mut self, from: SessionId, message: ServerMessage) {
        if self.verbose {
            info!("{} -> room: {}", from, message.to_string().trim_end());
        }
        self.registry.broadcast(from, &message);
    }

    /// Notify every session, close it and clear the registry
    fn handle_shutdown(&mut self) -> usize {
        self.shutting_down = true;

        let sessions = self.registry.drain();
        for session in &sessions {
            if let Err(e) = session.send(ServerMessage::ShuttingDown) {
                warn!("Shutdown notice to {} failed: {}", session.id, e);
            }
            // A full queue drops the close request; the handler's own
            // teardown closes the writer once the token is cancelled
            if let Err(e) = session.close() {
                warn!("Close request to {} failed: {}", session.id, e);
            }
        }

        info!("Drained {} sessions for shutdown", sessions.len());
        sessions.len()
    }
}

/// Cloneable handle to the ChatServer actor
#[derive(Debug, Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    /// Start a ChatServer actor and return its handle and task
    ///
    /// The actor stops once every handle is dropped.
    pub fn spawn(max_clients: usize, verbose: bool) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let server = ChatServer::new(max_clients, verbose, cmd_rx);
        let task = tokio::spawn(server.run());
        (Self { sender: cmd_tx }, task)
    }

    /// Register a session
    pub async fn register(&self, session: Session) -> Result<(), RegistryError> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(ServerCommand::Register { session, reply })
            .await
            .is_err()
        {
            return Err(RegistryError::ShuttingDown);
        }
        rx.await.unwrap_or(Err(RegistryError::ShuttingDown))
    }

    /// Unregister a session; safe to repeat
    pub async fn unregister(&self, id: SessionId) {
        let _ = self.sender.send(ServerCommand::Unregister { id }).await;
    }

    /// Broadcast to every session except `from`
    pub async fn broadcast(&self, from: SessionId, message: ServerMessage) {
        let _ = self
            .sender
            .send(ServerCommand::Broadcast { from, message })
            .await;
    }

    /// Snapshot of registered `(id, username)` pairs in join order
    pub async fn list_usernames(&self) -> Vec<(SessionId, String)> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(ServerCommand::ListUsernames { reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// First registered session named `username`
    pub async fn find_by_username(&self, username: &str) -> Option<Session> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ServerCommand::FindByUsername {
                username: username.to_string(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Drain the registry for shutdown; returns sessions notified
    pub async fn shutdown(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(ServerCommand::Shutdown { reply })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
