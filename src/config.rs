//! Server configuration
//!
//! `ServerConfig` is assembled from defaults, an optional TOML file and
//! command-line overrides, then validated before the listener binds.
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 9000
//! max_clients = 10
//! verbose = false
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default maximum number of concurrent sessions
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Validated server settings consumed by the core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind: IpAddr,
    /// TCP port (0 means unset and fails validation)
    pub port: u16,
    /// Session registry capacity
    pub max_clients: usize,
    /// Log message content and per-connection detail
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            max_clients: DEFAULT_MAX_CLIENTS,
            verbose: false,
        }
    }
}

impl ServerConfig {
    /// Load settings from a TOML file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the settings can start a server
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidMaxClients);
        }
        Ok(())
    }

    /// Address to bind the listener to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
