//! Shutdown coordination
//!
//! Tracks every connection handler task and drives the server-wide
//! shutdown: notify and close all sessions, stop all handlers, wait for
//! them, then release the listener.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::handler::{handle_connection, handle_stream};
use crate::server::ServerHandle;

/// Outcome of a completed shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions that were registered when shutdown began
    pub sessions_notified: usize,
}

/// Supervisor for connection handler tasks
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    server: ServerHandle,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    pub fn new(server: ServerHandle) -> Self {
        Self {
            server,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Token every handler observes at its blocking read
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of handler tasks still running
    pub fn active_handlers(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn a supervised handler for an accepted TCP connection
    pub fn spawn_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let server = self.server.clone();
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            if let Err(e) = handle_connection(stream, server, cancel).await {
                warn!("Connection handler error for {}: {}", peer_addr, e);
            }
        });
    }

    /// Spawn a supervised handler over an already split stream
    pub fn spawn_stream<R, W>(&self, reader: R, writer: W, peer_addr: SocketAddr)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let server = self.server.clone();
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            if let Err(e) = handle_stream(reader, writer, peer_addr, server, cancel).await {
                warn!("Connection handler error for {}: {}", peer_addr, e);
            }
        });
    }

    /// Run the shutdown protocol
    ///
    /// Drains the registry (each session gets the shutdown notice and is
    /// closed), cancels every handler, waits for all of them, and finally
    /// drops the listener if one is given. Handlers that race to
    /// unregister themselves are harmless: unregistering is idempotent.
    pub async fn shutdown(self, listener: Option<TcpListener>) -> ShutdownReport {
        info!("Shutting down server...");

        let sessions_notified = self.server.shutdown().await;

        self.cancel.cancel();
        self.tracker.close();
        debug!("Waiting for {} connection handlers", self.tracker.len());
        self.tracker.wait().await;

        if let Some(listener) = listener {
            if let Ok(addr) = listener.local_addr() {
                debug!("Closing listener on {}", addr);
            }
            drop(listener);
        }

        info!(
            "Shutdown complete: {} sessions notified",
            sessions_notified
        );
        ShutdownReport { sessions_notified }
    }
}
