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

//! Error types for the Parley chat service

use crate::types::SessionId;
use std::net::SocketAddr;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Result type for operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Chat service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (oversized line or invalid UTF-8)
    #[error("Codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// The listener could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested
        address: SocketAddr,
        /// Underlying bind failure
        #[source]
        source: std::io::Error,
    },

    /// Session with the given ID was not found
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// `start` was called while the server was not stopped
    #[error("Server already running")]
    AlreadyRunning,

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors end at most a single session and never affect the
    /// controller or other sessions.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::Timeout
                | ServiceError::ConnectionClosed
                | ServiceError::Io(_)
                | ServiceError::Codec(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ServiceError::SessionNotFound(_)
                | ServiceError::ConnectionClosed
                | ServiceError::Io(_)
                | ServiceError::Codec(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_recoverable() {
        assert!(ServiceError::Timeout.is_recoverable());
        assert!(ServiceError::ConnectionClosed.is_recoverable());
        assert!(ServiceError::Codec(LinesCodecError::MaxLineLengthExceeded).is_recoverable());
        assert!(!ServiceError::AlreadyRunning.is_recoverable());
        assert!(!ServiceError::InvalidConfig("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_is_connection_error() {
        assert!(ServiceError::SessionNotFound(SessionId::new(1)).is_connection_error());
        assert!(ServiceError::ConnectionClosed.is_connection_error());
        assert!(!ServiceError::Timeout.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::SessionNotFound(SessionId::new(42));
        assert_eq!(err.to_string(), "Session Client42 not found");

        let err = ServiceError::Bind {
            address: "127.0.0.1:5000".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("Failed to bind 127.0.0.1:5000"));
    }
}
