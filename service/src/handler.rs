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

//! Per-session client handler
//!
//! The ClientHandler is responsible for a single session's lifecycle once
//! the session ID has been sent (see [`Session::announce`]):
//! - The read / interpret / reply loop
//! - Recognizing the disconnect sentinel
//! - Cleanup (close, unregister, notify) exactly once on exit

use crate::interpreter::{interpret, is_disconnect_request};
use crate::{
    DisconnectReason, MessageEvent, ServerConfig, ServerMetrics, Session, SessionObserver,
    SessionRegistry, SessionState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};

/// Handler configuration
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Inbound line that ends the session
    pub disconnect_token: String,
    /// End the session after this long without input
    pub idle_timeout: Option<Duration>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for HandlerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            disconnect_token: config.disconnect_token.clone(),
            idle_timeout: config.connection.idle_timeout,
        }
    }
}

/// Drives one session from greeting to cleanup
pub struct ClientHandler {
    session: Session,
    registry: Arc<SessionRegistry>,
    observer: Arc<dyn SessionObserver>,
    metrics: Arc<ServerMetrics>,
    config: HandlerConfig,
    state: Arc<AtomicU8>,
}

impl ClientHandler {
    /// Create a handler for a registered session
    pub fn new(
        session: Session,
        registry: Arc<SessionRegistry>,
        observer: Arc<dyn SessionObserver>,
        metrics: Arc<ServerMetrics>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            session,
            registry,
            observer,
            metrics,
            config,
            state: Arc::new(AtomicU8::new(SessionState::AwaitingLine.as_u8())),
        }
    }

    /// Shared view of the handler's state, readable after `run` consumes it
    pub fn state_handle(&self) -> Arc<AtomicU8> {
        self.state.clone()
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Run the session to completion
    ///
    /// Consumes the handler, so cleanup can only ever run once.
    pub async fn run(self) -> DisconnectReason {
        let span = info_span!("session", session_id = %self.session.id());
        async move {
            self.observer.on_connect(self.session.id()).await;

            let reason = self.read_loop().await;
            self.cleanup(reason).await;
            reason
        }
        .instrument(span)
        .await
    }

    /// Reason to report when the stream ended or failed
    fn closed_reason(&self) -> DisconnectReason {
        if self.session.connection().is_closed() {
            DisconnectReason::ServerShutdown
        } else {
            DisconnectReason::Error
        }
    }

    async fn read_loop(&self) -> DisconnectReason {
        let id = self.session.id();
        let connection = self.session.connection();

        loop {
            self.set_state(SessionState::AwaitingLine);

            let next = match self.config.idle_timeout {
                Some(limit) => match timeout(limit, connection.read_line()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!(idle_timeout = ?limit, "Session idle too long");
                        return DisconnectReason::IdleTimeout;
                    }
                },
                None => connection.read_line().await,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) if connection.is_closed() => return DisconnectReason::ServerShutdown,
                Ok(None) => return DisconnectReason::PeerClosed,
                Err(e) => {
                    debug!(error = %e, "Read failed");
                    self.metrics.connection_error();
                    return DisconnectReason::Error;
                }
            };

            self.set_state(SessionState::Active);

            if is_disconnect_request(&line, &self.config.disconnect_token) {
                info!("Session requested disconnect");
                self.metrics.disconnect_requested();
                return DisconnectReason::Requested;
            }

            debug!(line = %line, "Received");
            self.metrics.message_received();
            self.observer
                .on_message(MessageEvent::inbound(id, line.as_str()))
                .await;

            let reply = interpret(&line);
            if let Err(e) = connection.write_line(&reply).await {
                debug!(error = %e, "Reply failed");
                self.metrics.connection_error();
                return self.closed_reason();
            }
            self.metrics.message_sent();
            self.observer
                .on_message(MessageEvent::outbound(id, reply))
                .await;
        }
    }

    async fn cleanup(&self, reason: DisconnectReason) {
        self.set_state(SessionState::Closed);
        let id = self.session.id();

        if let Err(e) = self.session.connection().close().await {
            warn!(error = %e, "Failed to close connection");
        }

        // Already gone if shutdown cleared the registry first.
        if self.registry.unregister(id).is_none() {
            debug!("Session was already unregistered");
        }
        self.metrics
            .session_closed(self.session.registered_at().elapsed());

        self.observer.on_disconnect(id, reason).await;
        info!(reason = %reason, "Session ended");
    }
}

impl std::fmt::Debug for ClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandler")
            .field("session_id", &self.session.id())
            .field("state", &self.state())
            .finish()
    }
}
