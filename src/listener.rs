//! Accept loop
//!
//! Accepts TCP connections until the shutdown signal fires, handing each
//! one to the `ShutdownCoordinator`, then runs the shutdown protocol.

use std::future::Future;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::server::ServerHandle;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};

/// Serve chat connections on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    config: &ServerConfig,
    shutdown: F,
) -> Result<ShutdownReport, AppError>
where
    F: Future<Output = ()>,
{
    let (server, actor) = ServerHandle::spawn(config.max_clients, config.verbose);
    let coordinator = ShutdownCoordinator::new(server.clone());

    info!(
        "Chat server listening on {} (max {} clients)",
        listener.local_addr()?,
        config.max_clients
    );

    tokio::pin!(shutdown);

    // Connection accept loop
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("Connection accepted from {}", addr);
                    coordinator.spawn_connection(stream, addr);
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    let report = coordinator.shutdown(Some(listener)).await;

    // The actor stops once the last handle is gone
    drop(server);
    if let Err(e) = actor.await {
        error!("ChatServer task failed: {}", e);
    }

    Ok(report)
}
