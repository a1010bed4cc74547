//! TCP Chat Room Server Library
//!
//! A line-oriented chat room over plain TCP built with tokio, using the
//! Actor pattern for the shared session registry.
//!
//! # Features
//! - Username handshake (first line of the connection)
//! - Room-wide broadcast of chat lines
//! - `/help`, `/list`, `/whisper <user> <message>` and `/exit` commands
//! - Bounded capacity with explicit rejection when full
//! - Graceful shutdown that notifies and disconnects every client
//!
//! # Architecture
//! - `ChatServer` is the actor owning the `SessionRegistry`
//! - Each connection runs a handler task plus a writer task; the writer is
//!   the only task touching the socket's write half
//! - `ShutdownCoordinator` supervises handler tasks and cancels them on shutdown
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chatroom_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig { port: 9000, ..Default::default() };
//!     let listener = TcpListener::bind(config.socket_addr()).await.unwrap();
//!     let ctrl_c = async { tokio::signal::ctrl_c().await.unwrap() };
//!     serve(listener, &config, ctrl_c).await.unwrap();
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod types;

// Re-export main types for convenience
pub use command::{Command, Flow};
pub use config::ServerConfig;
pub use error::{AppError, CommandError, ConfigError, HandshakeError, RegistryError, SendError};
pub use handler::{handle_connection, handle_stream};
pub use listener::serve;
pub use message::{ClientMessage, ServerMessage};
pub use registry::SessionRegistry;
pub use server::{ChatServer, ServerCommand, ServerHandle};
pub use session::{Outbound, Session};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use types::{SessionId, Username};
