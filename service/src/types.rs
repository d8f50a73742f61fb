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

//! Core types for the Parley chat service

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a session (monotonically increasing, never reused)
///
/// Renders as `Client<N>`, which is also the name sent to the peer as the
/// first line of a new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client{}", self.0)
    }
}

/// Per-session handler state (stored as atomic u8 for lock-free reads)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Waiting for the next inbound line
    AwaitingLine = 0,
    /// A line was received and is being answered
    Active = 1,
    /// The read loop has exited
    Closed = 2,
}

impl SessionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::AwaitingLine,
            1 => Self::Active,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the session has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingLine => write!(f, "awaiting-line"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Server controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    /// Not listening; `start` may be called
    Stopped = 0,
    /// Accepting connections
    Listening = 1,
    /// Shutdown in progress
    Stopping = 2,
}

impl ServerState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Listening,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Listening => write!(f, "listening"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed its end of the stream
    PeerClosed,
    /// The peer sent the disconnect sentinel
    Requested,
    /// A read or write failed
    Error,
    /// No input arrived within the configured idle timeout
    IdleTimeout,
    /// The connection was force-closed by the server
    ServerShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::Requested => write!(f, "disconnect requested"),
            Self::Error => write!(f, "i/o error"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::ServerShutdown => write!(f, "server shutdown"),
        }
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Lifecycle state at the time of the snapshot
    pub state: ServerState,
    /// Number of registered sessions
    pub active_sessions: usize,
    /// Total sessions since the server was created
    pub total_sessions: u64,
    /// Bound address, if listening
    pub bind_address: Option<SocketAddr>,
    /// Time since the server was created
    pub uptime: Duration,
    /// When the server was created
    pub created_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bind_address {
            Some(addr) => write!(
                f,
                "ChatServer {{ state: {}, active: {}, total: {}, addr: {}, uptime: {:?} }}",
                self.state, self.active_sessions, self.total_sessions, addr, self.uptime
            ),
            None => write!(
                f,
                "ChatServer {{ state: {}, active: {}, total: {}, uptime: {:?} }}",
                self.state, self.active_sessions, self.total_sessions, self.uptime
            ),
        }
    }
}
