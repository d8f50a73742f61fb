//
// Copyright 2017-2025 Hans W. Uhlig. All Rights Reserved.
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

//! Line-based Chat Server
//!
//! This crate provides an async, multi-client chat service speaking a
//! newline-delimited text protocol over TCP:
//!
//! - Every accepted connection becomes a session with a unique `ClientN` ID
//! - The ID is sent as the first line so the client learns its name
//! - Each inbound line gets exactly one reply from a fixed set of canned
//!   commands, or an echo when nothing matches
//! - A client ends its session by sending the disconnect sentinel
//! - Shutting the server down notifies and closes every live session
//!
//! # Architecture
//!
//! ```text
//! ChatServer
//!     ↓
//! SessionRegistry
//!     ↓
//! ClientHandler → LineConnection
//! ```
//!
//! # Example
//!
//! ```no_run
//! use parley_service::{ChatServer, DisconnectReason, ServerConfig, SessionId, SessionObserver};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Announcer;
//!
//! #[async_trait]
//! impl SessionObserver for Announcer {
//!     async fn on_connect(&self, id: SessionId) {
//!         println!("{id} joined");
//!     }
//!
//!     async fn on_disconnect(&self, id: SessionId, reason: DisconnectReason) {
//!         println!("{id} left ({reason})");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::new(ServerConfig::default())?;
//!     server.start(Arc::new(Announcer)).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod handler;
mod interpreter;
mod metrics;
mod observer;
mod registry;
mod server;
mod types;

pub use config::{
    ConnectionConfig, DEFAULT_DISCONNECT_TOKEN, DEFAULT_PORT, DEFAULT_SHUTDOWN_NOTICE,
    ServerConfig,
};
pub use connection::{ConnectionKey, LineConnection};
pub use error::{Result, ServiceError};
pub use handler::{ClientHandler, HandlerConfig};
pub use interpreter::{
    CommandResponse, ECHO_PREFIX, EXACT_RULES, SUBSTRING_RULES, Trigger, canned_reply, interpret,
    is_disconnect_request, normalize,
};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use observer::{
    CallbackObserver, ChannelObserver, ChatEvent, Direction, MessageEvent, NoopObserver,
    ServerEvent, SessionObserver,
};
pub use registry::{Session, SessionRegistry};
pub use server::ChatServer;
pub use types::{DisconnectReason, ServerSnapshot, ServerState, SessionId, SessionState};
