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

//! Line-oriented connection
//!
//! A [`LineConnection`] frames a duplex byte stream into newline-delimited
//! UTF-8 lines. The read half is driven by the session's handler; the write
//! half is shared between the handler and the server controller. Closing the
//! connection from any task shuts the write half down and wakes a reader that
//! is blocked in [`LineConnection::read_line`].

use crate::{ConnectionConfig, Result, ServiceError};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Identity of a live connection, used for the registry's inverse lookup
///
/// Two clones of the same [`LineConnection`] share a key. A key is only
/// meaningful while some clone of its connection is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey(usize);

/// A newline-delimited text connection
///
/// Cloning is cheap; all clones refer to the same underlying stream.
#[derive(Clone)]
pub struct LineConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    reader: Mutex<FramedRead<BoxedReader, LinesCodec>>,
    writer: Mutex<Option<FramedWrite<BoxedWriter, LinesCodec>>>,

    closed: AtomicBool,
    close_signal: CancellationToken,

    peer_addr: Option<SocketAddr>,
    write_timeout: Duration,
    created_at: Instant,

    lines_sent: AtomicU64,
    lines_received: AtomicU64,
}

impl LineConnection {
    /// Wrap any duplex stream
    pub fn new<S>(stream: S, peer_addr: Option<SocketAddr>, config: &ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader: BoxedReader = Box::new(read_half);
        let writer: BoxedWriter = Box::new(write_half);

        gauge!("parley.connections.active").increment(1.0);

        Self {
            inner: Arc::new(ConnectionInner {
                reader: Mutex::new(FramedRead::new(
                    reader,
                    LinesCodec::new_with_max_length(config.max_line_length),
                )),
                writer: Mutex::new(Some(FramedWrite::new(writer, LinesCodec::new()))),
                closed: AtomicBool::new(false),
                close_signal: CancellationToken::new(),
                peer_addr,
                write_timeout: config.write_timeout,
                created_at: Instant::now(),
                lines_sent: AtomicU64::new(0),
                lines_received: AtomicU64::new(0),
            }),
        }
    }

    /// Wrap an accepted TCP stream
    pub fn wrap(socket: TcpStream, config: &ConnectionConfig) -> Result<Self> {
        let peer_addr = socket.peer_addr()?;
        if let Err(e) = socket.set_nodelay(true) {
            warn!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
        }
        debug!(peer_addr = %peer_addr, "Creating new line connection");
        Ok(Self::new(socket, Some(peer_addr), config))
    }

    /// Identity shared by every clone of this connection
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey(Arc::as_ptr(&self.inner) as usize)
    }

    /// Get the peer address, if the stream has one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Lines written so far
    pub fn lines_sent(&self) -> u64 {
        self.inner.lines_sent.load(Ordering::Relaxed)
    }

    /// Lines read so far
    pub fn lines_received(&self) -> u64 {
        self.inner.lines_received.load(Ordering::Relaxed)
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Receive the next line
    ///
    /// Returns `Ok(None)` when the peer ends the stream or when the
    /// connection is closed locally, including while this call is waiting.
    /// The line terminator is not included.
    pub async fn read_line(&self) -> Result<Option<String>> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut reader = self.inner.reader.lock().await;
        let next = tokio::select! {
            biased;
            _ = self.inner.close_signal.cancelled() => {
                trace!("Read interrupted by close");
                return Ok(None);
            }
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                self.inner.lines_received.fetch_add(1, Ordering::Relaxed);
                counter!("parley.lines.received").increment(1);
                trace!(len = line.len(), "Line received");
                Ok(Some(line))
            }
            Some(Err(e)) => {
                counter!("parley.errors.receive").increment(1);
                Err(e.into())
            }
            None => {
                debug!("Connection stream ended");
                Ok(None)
            }
        }
    }

    /// Send one line; a `\n` terminator is appended
    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        if self.is_closed() {
            return Err(ServiceError::ConnectionClosed);
        }
        let writer = guard.as_mut().ok_or(ServiceError::ConnectionClosed)?;

        match timeout(self.inner.write_timeout, writer.send(line)).await {
            Ok(Ok(())) => {
                self.inner.lines_sent.fetch_add(1, Ordering::Relaxed);
                counter!("parley.lines.sent").increment(1);
                trace!(len = line.len(), "Line sent");
                Ok(())
            }
            Ok(Err(e)) => {
                counter!("parley.errors.send").increment(1);
                Err(e.into())
            }
            Err(_) => {
                counter!("parley.errors.send").increment(1);
                Err(ServiceError::Timeout)
            }
        }
    }

    /// Close the connection
    ///
    /// Idempotent: only the first call does any work, later calls return
    /// `Ok(())`. A pending [`read_line`](Self::read_line) returns `Ok(None)`.
    #[instrument(skip(self), fields(peer_addr = ?self.inner.peer_addr))]
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.inner.close_signal.cancel();
        gauge!("parley.connections.active").decrement(1.0);

        let writer = self.inner.writer.lock().await.take();
        if let Some(writer) = writer {
            let mut stream = writer.into_inner();
            timeout(self.inner.write_timeout, stream.shutdown())
                .await
                .map_err(|_| ServiceError::Timeout)??;
        }

        debug!("Connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for LineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConnection")
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .field("created_at", &self.inner.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    fn pair() -> (LineConnection, tokio::io::DuplexStream) {
        let (local, remote) = duplex(1024);
        (
            LineConnection::new(local, None, &ConnectionConfig::default()),
            remote,
        )
    }

    #[tokio::test]
    async fn test_read_lines_strip_terminators() {
        let (conn, mut remote) = pair();
        remote.write_all(b"hello\r\nworld\n").await.unwrap();

        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("world"));
        assert_eq!(conn.lines_received(), 2);
    }

    #[tokio::test]
    async fn test_eof_is_none() {
        let (conn, remote) = pair();
        drop(remote);
        assert!(conn.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let (conn, remote) = pair();
        conn.write_line("Client1").await.unwrap();

        let mut lines = BufReader::new(remote).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("Client1"));
        assert_eq!(conn.lines_sent(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, _remote) = pair();
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.write_line("late").await,
            Err(ServiceError::ConnectionClosed)
        ));
        assert!(conn.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (conn, _remote) = pair();
        let reader = conn.clone();
        let pending = tokio::spawn(async move { reader.read_line().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        conn.close().await.unwrap();

        let result = timeout(Duration::from_secs(1), pending)
            .await
            .expect("read did not return after close")
            .unwrap();
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (conn, remote) = pair();
        conn.close().await.unwrap();

        let mut lines = BufReader::new(remote).lines();
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_is_error() {
        let (local, mut remote) = duplex(1024);
        let conn = LineConnection::new(
            local,
            None,
            &ConnectionConfig::default().with_max_line_length(4),
        );
        remote.write_all(b"far too long\n").await.unwrap();

        let err = conn.read_line().await.unwrap_err();
        assert!(matches!(err, ServiceError::Codec(_)));
    }

    #[tokio::test]
    async fn test_clones_share_key() {
        let (conn, _remote) = pair();
        let (other, _other_remote) = pair();
        assert_eq!(conn.key(), conn.clone().key());
        assert_ne!(conn.key(), other.key());
    }
}
