//! TCP Chat Room Server - Entry Point
//!
//! Parses the command line, loads configuration, binds the listener and
//! serves until Ctrl-C or SIGTERM.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatroom_server::{serve, ServerConfig};

/// Line-oriented TCP chat room server
#[derive(Parser, Debug)]
#[command(name = "chatroom_server", version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum number of concurrent clients
    #[arg(long)]
    max_clients: Option<usize>,

    /// Log message content and connection detail
    #[arg(short, long)]
    verbose: bool,

    /// Address to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merge file settings (if any) with command-line overrides
    fn into_config(self) -> Result<ServerConfig, chatroom_server::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = max_clients;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        config.verbose |= self.verbose;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    let default_filter = if config.verbose {
        "chatroom_server=debug"
    } else {
        "chatroom_server=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if config.verbose {
        info!("Verbose mode enabled");
    }

    let addr = config.socket_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to listen on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    match serve(listener, &config, shutdown_signal()).await {
        Ok(report) => {
            info!(
                "Server stopped ({} clients disconnected)",
                report.sessions_notified
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
