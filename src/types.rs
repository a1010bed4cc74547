//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: monotonic unique session identifier
//! - `Username`: validated display name chosen during the handshake

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::HandshakeError;

/// Maximum username length in bytes
pub const MAX_USERNAME_LEN: usize = 31;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique session identifier (newtype pattern)
///
/// Drawn from a process-wide counter, so ids never repeat and order by
/// connection time. Implements Ord for use as BTreeMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocate the next session ID
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Participant display name
///
/// 1 to 31 bytes after trimming surrounding whitespace. Not unique across
/// sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Validate a proposed username from a handshake line
    pub fn parse(raw: &str) -> Result<Self, HandshakeError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(HandshakeError::Empty);
        }
        if name.len() > MAX_USERNAME_LEN {
            return Err(HandshakeError::TooLong {
                len: name.len(),
                max: MAX_USERNAME_LEN,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
