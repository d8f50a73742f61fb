//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Server and connection configuration
//!
//! # Examples
//!
//! ```
//! use parley_service::{ConnectionConfig, ServerConfig};
//! use std::time::Duration;
//!
//! let config = ServerConfig::default()
//!     .with_port(6000)
//!     .with_max_connections(Some(64))
//!     .with_connection(
//!         ConnectionConfig::default().with_idle_timeout(Some(Duration::from_secs(600))),
//!     );
//! assert!(config.validate().is_ok());
//! ```

use crate::{Result, ServiceError};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;

/// Default disconnect sentinel
pub const DEFAULT_DISCONNECT_TOKEN: &str = "SHUTDOWN";

/// Default notice broadcast to every session on shutdown
pub const DEFAULT_SHUTDOWN_NOTICE: &str = "[Server]: Server is shutting down.";

/// Per-connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Longest accepted inbound line, in bytes, excluding the terminator
    pub max_line_length: usize,

    /// Timeout for a single line write
    pub write_timeout: Duration,

    /// Close sessions that send nothing for this long (None for no limit)
    pub idle_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_line_length: 8192,
            write_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Set the maximum line length
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Server configuration
///
/// This structure contains all configuration options for the chat server.
/// Use the builder pattern methods to customize the configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sessions (None for no limit)
    pub max_connections: Option<usize>,

    /// Pause after a failed accept before trying again
    pub accept_backoff: Duration,

    /// How long shutdown waits for the accept loop to exit
    pub shutdown_timeout: Duration,

    /// Line sent to every session when the server shuts down
    pub shutdown_notice: String,

    /// Inbound line (compared case-insensitively) that ends a session
    pub disconnect_token: String,

    /// Per-connection settings
    pub connection: ConnectionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: None,
            accept_backoff: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(5),
            shutdown_notice: DEFAULT_SHUTDOWN_NOTICE.to_string(),
            disconnect_token: DEFAULT_DISCONNECT_TOKEN.to_string(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Keep the bind IP, listen on `port`
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address.set_port(port);
        self
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the accept back-off
    pub fn with_accept_backoff(mut self, backoff: Duration) -> Self {
        self.accept_backoff = backoff;
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the shutdown notice
    pub fn with_shutdown_notice(mut self, notice: impl Into<String>) -> Self {
        self.shutdown_notice = notice.into();
        self
    }

    /// Set the disconnect sentinel
    pub fn with_disconnect_token(mut self, token: impl Into<String>) -> Self {
        self.disconnect_token = token.into();
        self
    }

    /// Set the per-connection settings
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == Some(0) {
            return Err(ServiceError::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "shutdown_timeout must be greater than 0".to_string(),
            ));
        }

        if self.disconnect_token.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "disconnect_token must not be blank".to_string(),
            ));
        }

        if self.connection.max_line_length == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_line_length must be greater than 0".to_string(),
            ));
        }

        if self.connection.write_timeout.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "write_timeout must be greater than 0".to_string(),
            ));
        }

        if self.connection.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ServiceError::InvalidConfig(
                "idle_timeout must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}
