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

//! Observer traits and implementations for the chat server
//!
//! A presentation layer learns about sessions and traffic through a
//! [`SessionObserver`]. The server never depends on how events are rendered.

use crate::{DisconnectReason, SessionId};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::sync::broadcast;

/// Direction of a message relative to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server
    Inbound,
    /// Server to client
    Outbound,
}

/// A line exchanged on a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Session the line belongs to
    pub session_id: SessionId,
    /// Which way the line travelled
    pub direction: Direction,
    /// Line text without terminator
    pub text: String,
}

impl MessageEvent {
    /// Line received from a client
    pub fn inbound(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            direction: Direction::Inbound,
            text: text.into(),
        }
    }

    /// Line sent to a client
    pub fn outbound(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            session_id,
            direction: Direction::Outbound,
            text: text.into(),
        }
    }
}

/// Controller-level log events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The listener is bound and accepting
    Started {
        /// Actual bound address
        address: SocketAddr,
    },
    /// An accept failed while listening
    AcceptError {
        /// Error description
        error: String,
    },
    /// Shutdown began
    ShuttingDown {
        /// Sessions that will receive the shutdown notice
        sessions: usize,
    },
    /// Shutdown finished
    Stopped,
}

/// Server event observer trait
///
/// Implement this trait to follow what the chat server does. All methods
/// are async and have default implementations that do nothing.
///
/// # Example
///
/// ```no_run
/// use parley_service::{MessageEvent, SessionObserver};
/// use async_trait::async_trait;
///
/// struct Transcript;
///
/// #[async_trait]
/// impl SessionObserver for Transcript {
///     async fn on_message(&self, event: MessageEvent) {
///         println!("{}: {}", event.session_id, event.text);
///     }
/// }
/// ```
#[async_trait]
pub trait SessionObserver: Send + Sync + 'static {
    /// Called once a session is registered, before its first line is read
    async fn on_connect(&self, _id: SessionId) {}

    /// Called for every inbound line and every reply
    async fn on_message(&self, _event: MessageEvent) {}

    /// Called exactly once when a session ends, for any reason
    async fn on_disconnect(&self, _id: SessionId, _reason: DisconnectReason) {}

    /// Called for controller-level events
    async fn on_server_event(&self, _event: ServerEvent) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl SessionObserver for NoopObserver {}

/// Everything a [`ChannelObserver`] publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A session was registered
    Connected(SessionId),
    /// A line was exchanged
    Message(MessageEvent),
    /// A session ended
    Disconnected {
        /// Session that ended
        id: SessionId,
        /// Why it ended
        reason: DisconnectReason,
    },
    /// A controller-level event
    Server(ServerEvent),
}

/// Observer that republishes events on a broadcast channel
///
/// Slow subscribers lag rather than slowing down sessions; a send with no
/// subscribers is dropped.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: broadcast::Sender<ChatEvent>,
}

impl ChannelObserver {
    /// Create an observer and its first subscriber
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<ChatEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Add another subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: ChatEvent) {
        // No receivers is not a failure.
        let _ = self.sender.send(event);
    }
}

#[async_trait]
impl SessionObserver for ChannelObserver {
    async fn on_connect(&self, id: SessionId) {
        self.publish(ChatEvent::Connected(id));
    }

    async fn on_message(&self, event: MessageEvent) {
        self.publish(ChatEvent::Message(event));
    }

    async fn on_disconnect(&self, id: SessionId, reason: DisconnectReason) {
        self.publish(ChatEvent::Disconnected { id, reason });
    }

    async fn on_server_event(&self, event: ServerEvent) {
        self.publish(ChatEvent::Server(event));
    }
}

/// Callback-based observer implementation
///
/// # Example
///
/// ```no_run
/// use parley_service::CallbackObserver;
/// use std::sync::Arc;
///
/// let observer = Arc::new(CallbackObserver {
///     on_connect: Some(Box::new(|id| println!("{} connected", id))),
///     on_disconnect: Some(Box::new(|id, reason| println!("{} left: {}", id, reason))),
///     ..Default::default()
/// });
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    /// Called on session registration
    pub on_connect: Option<Box<dyn Fn(SessionId) + Send + Sync + 'static>>,
    /// Called per message
    pub on_message: Option<Box<dyn Fn(&MessageEvent) + Send + Sync + 'static>>,
    /// Called on session end
    pub on_disconnect: Option<Box<dyn Fn(SessionId, DisconnectReason) + Send + Sync + 'static>>,
    /// Called on controller events
    pub on_server_event: Option<Box<dyn Fn(&ServerEvent) + Send + Sync + 'static>>,
}

#[async_trait]
impl SessionObserver for CallbackObserver {
    async fn on_connect(&self, id: SessionId) {
        if let Some(ref f) = self.on_connect {
            f(id);
        }
    }

    async fn on_message(&self, event: MessageEvent) {
        if let Some(ref f) = self.on_message {
            f(&event);
        }
    }

    async fn on_disconnect(&self, id: SessionId, reason: DisconnectReason) {
        if let Some(ref f) = self.on_disconnect {
            f(id, reason);
        }
    }

    async fn on_server_event(&self, event: ServerEvent) {
        if let Some(ref f) = self.on_server_event {
            f(&event);
        }
    }
}
