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

//! Chat client

use crate::{ClientConfig, ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info};

/// Client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Session established, lines can be sent
    Connected,
    /// Disconnected locally or by the server
    Disconnected,
}

/// A single chat session with the server
pub struct ChatClient {
    config: ClientConfig,
    session_name: String,
    peer_addr: Option<SocketAddr>,
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: Option<FramedWrite<OwnedWriteHalf, LinesCodec>>,
}

impl ChatClient {
    /// Connect and read the assigned session name
    ///
    /// The server's first line names the session; a connection that closes
    /// before sending it is reported as [`ClientError::ConnectionClosed`].
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let address = config.address();
        debug!("Connecting to {}", address);
        let stream = timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ClientError::ConnectionTimeout)??;
        let peer_addr = stream.peer_addr().ok();

        let (read, write) = stream.into_split();
        let mut client = Self {
            reader: FramedRead::new(read, LinesCodec::new_with_max_length(config.max_line_length)),
            writer: Some(FramedWrite::new(write, LinesCodec::new())),
            session_name: String::new(),
            peer_addr,
            config,
        };

        client.session_name = client
            .next_line()
            .await?
            .ok_or(ClientError::ConnectionClosed)?;
        info!("Connected to {} as {}", address, client.session_name);

        Ok(client)
    }

    /// Name the server assigned to this session
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Server address
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        if self.writer.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if lines can still be sent
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a line to the server
    ///
    /// Empty lines are skipped.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(ClientError::NotConnected)?;
        if text.is_empty() {
            debug!("Skipping empty message");
            return Ok(());
        }
        writer.send(text).await?;
        Ok(())
    }

    /// Wait for the next line from the server
    ///
    /// Returns `Ok(None)` once the server has closed the connection.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let next = match self.config.read_timeout {
            Some(limit) => timeout(limit, self.reader.next())
                .await
                .map_err(|_| ClientError::ReadTimeout)?,
            None => self.reader.next().await,
        };
        next.transpose().map_err(ClientError::from)
    }

    /// Send the disconnect sentinel and close the sending side
    ///
    /// Further sends fail with [`ClientError::NotConnected`]. Calling this
    /// again does nothing.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        info!("Disconnecting {}", self.session_name);

        let sent = writer.send(self.config.disconnect_token.as_str()).await;
        let closed = SinkExt::<&str>::close(&mut writer).await;
        sent?;
        closed?;
        Ok(())
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("session_name", &self.session_name)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}
