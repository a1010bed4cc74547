//! Session registry
//!
//! Bounded collection of active sessions keyed by `SessionId`. Owned by
//! the `ChatServer` actor, so every operation here is serialized by the
//! actor's command queue.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::message::ServerMessage;
use crate::session::Session;
use crate::types::SessionId;

/// Active sessions, at most `capacity` of them
///
/// Iteration follows id order, which is connection order.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
    capacity: usize,
}

impl SessionRegistry {
    /// Create an empty registry holding at most `capacity` sessions
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            capacity,
        }
    }

    /// Add a session that completed its handshake
    ///
    /// Fails with `Full` at capacity; the caller must reject the
    /// connection.
    pub fn register(&mut self, session: Session) -> Result<(), RegistryError> {
        if self.sessions.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    /// Remove a session if present
    ///
    /// Returns the removed session, or `None` when it was already gone.
    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// Queue `msg` for every session except `sender`
    ///
    /// A recipient that cannot take the message is logged and skipped. It
    /// stays registered; its own handler notices the dead connection.
    /// Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, sender: SessionId, msg: &ServerMessage) -> usize {
        let mut delivered = 0;
        for (id, session) in &self.sessions {
            if *id == sender {
                continue;
            }
            match session.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Skipping recipient {} ({}): {}", id, session.username, e),
            }
        }
        debug!("Broadcast from {} queued for {} sessions", sender, delivered);
        delivered
    }

    /// Snapshot of `(id, username)` in iteration order
    pub fn list_usernames(&self) -> Vec<(SessionId, String)> {
        self.sessions
            .values()
            .map(|s| (s.id, s.username.to_string()))
            .collect()
    }

    /// First session whose username equals `name` exactly
    pub fn find_by_username(&self, name: &str) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| s.username.as_str() == name)
    }

    /// Remove and return every session
    pub fn drain(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions).into_values().collect()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
