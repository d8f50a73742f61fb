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

//! Chat server controller
//!
//! The ChatServer is the main entry point of the service. It owns the TCP
//! listener and the accept loop, registers a session for every accepted
//! connection, spawns a [`ClientHandler`] per session, and coordinates
//! shutdown across all sessions.

use crate::{
    ClientHandler, HandlerConfig, LineConnection, NoopObserver, Result, ServerConfig,
    ServerEvent, ServerMetrics, ServerSnapshot, ServerState, ServiceError, Session,
    SessionObserver, SessionRegistry,
};
use futures_util::future::join_all;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Chat server controller
///
/// # Example
///
/// ```no_run
/// use parley_service::{ChatServer, NoopObserver, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = ChatServer::new(ServerConfig::default())?;
///     let address = server.start(Arc::new(NoopObserver)).await?;
///     println!("listening on {address}");
///
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct ChatServer {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Live sessions
    registry: Arc<SessionRegistry>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Lifecycle state (`ServerState` as u8)
    state: Arc<AtomicU8>,
    /// Bound address while listening
    local_addr: std::sync::Mutex<Option<SocketAddr>>,
    /// Creation time
    created_at: Instant,
    /// Serializes `start` and `shutdown`
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    stop: Option<CancellationToken>,
    accept_handle: Option<JoinHandle<()>>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ChatServer {
    /// Create a stopped server
    ///
    /// Nothing is bound until [`start`](Self::start).
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            metrics: Arc::new(ServerMetrics::new()),
            state: Arc::new(AtomicU8::new(ServerState::Stopped.as_u8())),
            local_addr: std::sync::Mutex::new(None),
            created_at: Instant::now(),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
        })
    }

    fn set_state(&self, state: ServerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = addr;
    }

    /// Bind the listener and start accepting connections
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested. On bind failure the server stays stopped.
    pub async fn start(&self, observer: Arc<dyn SessionObserver>) -> Result<SocketAddr> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.state() != ServerState::Stopped {
            return Err(ServiceError::AlreadyRunning);
        }

        let requested = self.config.bind_address;
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| ServiceError::Bind {
                address: requested,
                source,
            })?;
        let address = listener.local_addr()?;

        let stop = CancellationToken::new();
        self.set_local_addr(Some(address));
        self.set_state(ServerState::Listening);
        info!(address = %address, "Chat server listening");
        observer
            .on_server_event(ServerEvent::Started { address })
            .await;

        let accept_loop = AcceptLoop {
            listener,
            stop: stop.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            observer: observer.clone(),
            state: self.state.clone(),
        };
        lifecycle.accept_handle = Some(tokio::spawn(accept_loop.run()));
        lifecycle.stop = Some(stop);
        lifecycle.observer = Some(observer);

        Ok(address)
    }

    /// Shut the server down
    ///
    /// Stops accepting, sends the shutdown notice to every registered session,
    /// force-closes their connections and empties the registry. Per-session
    /// failures are logged and do not stop the shutdown. Handlers finish their
    /// own cleanup independently; this call does not wait for them.
    ///
    /// Calling this on a server that is not listening does nothing.
    pub async fn shutdown(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.state() != ServerState::Listening {
            debug!(state = %self.state(), "Shutdown requested while not listening");
            return Ok(());
        }

        self.set_state(ServerState::Stopping);
        info!("Shutting down chat server");
        let observer = lifecycle
            .observer
            .take()
            .unwrap_or_else(|| Arc::new(NoopObserver));

        if let Some(stop) = lifecycle.stop.take() {
            stop.cancel();
        }
        if let Some(mut handle) = lifecycle.accept_handle.take() {
            match timeout(self.config.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Accept loop task failed"),
                Err(_) => {
                    warn!("Accept loop did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        let sessions = self.registry.all_sessions();
        observer
            .on_server_event(ServerEvent::ShuttingDown {
                sessions: sessions.len(),
            })
            .await;

        join_all(sessions.iter().map(|session| self.notify_and_close(session))).await;
        self.registry.clear();

        self.set_local_addr(None);
        self.set_state(ServerState::Stopped);
        observer.on_server_event(ServerEvent::Stopped).await;
        info!(sessions = sessions.len(), "Chat server shutdown complete");

        Ok(())
    }

    async fn notify_and_close(&self, session: &Session) {
        let connection = session.connection();
        let mut failed = false;

        if let Err(e) = connection.write_line(&self.config.shutdown_notice).await {
            warn!(session_id = %session.id(), error = %e, "Failed to send shutdown notice");
            failed = true;
        }
        if let Err(e) = connection.close().await {
            warn!(session_id = %session.id(), error = %e, "Failed to close session");
            failed = true;
        }

        if failed {
            self.metrics.shutdown_failure();
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if the server is accepting connections
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Listening
    }

    /// Get the bound address while listening
    pub fn bind_address(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the number of registered sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            state: self.state(),
            active_sessions: self.registry.len(),
            total_sessions: self.metrics.total_sessions(),
            bind_address: self.bind_address(),
            uptime: self.created_at.elapsed(),
            created_at: self.created_at,
        }
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for ChatServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatServer")
            .field("bind_address", &self.bind_address())
            .field("state", &self.state())
            .field("session_count", &self.session_count())
            .finish()
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if self.state() == ServerState::Listening {
            warn!("ChatServer dropped while still running");
            if let Some(stop) = self.lifecycle.get_mut().stop.take() {
                stop.cancel();
            }
        }
    }
}

/// Everything the accept task needs, moved into it on `start`
struct AcceptLoop {
    listener: TcpListener,
    stop: CancellationToken,
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    metrics: Arc<ServerMetrics>,
    observer: Arc<dyn SessionObserver>,
    state: Arc<AtomicU8>,
}

impl AcceptLoop {
    fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
            || ServerState::from_u8(self.state.load(Ordering::Acquire)) != ServerState::Listening
    }

    async fn run(self) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((socket, peer_addr)) => self.admit(socket, peer_addr).await,
                Err(e) if self.is_stopping() => {
                    debug!(error = %e, "Accept failed during shutdown");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    self.metrics.accept_error();
                    self.observer
                        .on_server_event(ServerEvent::AcceptError {
                            error: e.to_string(),
                        })
                        .await;

                    // Back off on errors to avoid a tight loop
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = sleep(self.config.accept_backoff) => {}
                    }
                }
            }
        }

        info!("Accept loop terminated");
    }

    /// Register, send the session ID and spawn a handler
    ///
    /// The ID line is written before this returns, so a shutdown, which waits
    /// for the accept loop to stop, can never write ahead of it.
    async fn admit(&self, socket: TcpStream, peer_addr: SocketAddr) {
        if self
            .config
            .max_connections
            .is_some_and(|max| self.registry.len() >= max)
        {
            warn!(peer_addr = %peer_addr, "Session limit reached, rejecting connection");
            self.metrics.session_rejected();
            return;
        }

        let connection = match LineConnection::wrap(socket, &self.config.connection) {
            Ok(connection) => connection,
            Err(e) => {
                warn!(peer_addr = %peer_addr, error = %e, "Failed to wrap connection");
                self.metrics.connection_error();
                return;
            }
        };

        let session = self.registry.register(connection);
        if let Err(e) = session.announce().await {
            warn!(session_id = %session.id(), error = %e, "Failed to send session ID");
            self.metrics.connection_error();
            self.registry.unregister(session.id());
            if let Err(e) = session.connection().close().await {
                debug!(session_id = %session.id(), error = %e, "Failed to close connection");
            }
            return;
        }
        self.metrics.session_opened();
        info!(session_id = %session.id(), peer_addr = %peer_addr, "Session connected");

        let handler = ClientHandler::new(
            session,
            self.registry.clone(),
            self.observer.clone(),
            self.metrics.clone(),
            HandlerConfig::from(self.config.as_ref()),
        );
        tokio::spawn(handler.run());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn local_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_server_lifecycle() {
        let server = ChatServer::new(local_config()).unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.bind_address().is_none());

        let address = server.start(Arc::new(NoopObserver)).await.unwrap();
        assert!(server.is_running());
        assert_ne!(address.port(), 0);
        assert_eq!(server.bind_address(), Some(address));

        server.shutdown().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.bind_address().is_none());

        assert!(logs_contain("Chat server listening"));
        assert!(logs_contain("Chat server shutdown complete"));
    }

    #[tokio::test]
    async fn test_server_double_start() {
        let server = ChatServer::new(local_config()).unwrap();
        server.start(Arc::new(NoopObserver)).await.unwrap();

        let result = server.start(Arc::new(NoopObserver)).await;
        assert!(matches!(result, Err(ServiceError::AlreadyRunning)));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_when_stopped_is_noop() {
        let server = ChatServer::new(local_config()).unwrap();
        server.shutdown().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_shutdown() {
        let server = ChatServer::new(local_config()).unwrap();
        server.start(Arc::new(NoopObserver)).await.unwrap();
        server.shutdown().await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        server.start(Arc::new(NoopObserver)).await.unwrap();
        assert!(server.is_running());
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = local_config().with_max_connections(Some(0));
        assert!(matches!(
            ChatServer::new(config),
            Err(ServiceError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_server_snapshot() {
        let server = ChatServer::new(local_config()).unwrap();
        let snapshot = server.snapshot();

        assert_eq!(snapshot.state, ServerState::Stopped);
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.total_sessions, 0);
        assert!(snapshot.bind_address.is_none());
    }
}
