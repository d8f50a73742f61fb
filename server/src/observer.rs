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

//! Observer that writes chat activity to the log

use async_trait::async_trait;
use parley_service::{
    Direction, DisconnectReason, MessageEvent, ServerEvent, SessionId, SessionObserver,
};
use tracing::{info, warn};

/// Renders session and server events as log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

#[async_trait]
impl SessionObserver for LoggingObserver {
    async fn on_connect(&self, id: SessionId) {
        info!("{} connected", id);
    }

    async fn on_message(&self, event: MessageEvent) {
        match event.direction {
            Direction::Inbound => info!("{}: {}", event.session_id, event.text),
            Direction::Outbound => info!("Server to {}: {}", event.session_id, event.text),
        }
    }

    async fn on_disconnect(&self, id: SessionId, reason: DisconnectReason) {
        info!("{} disconnected ({})", id, reason);
    }

    async fn on_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Started { address } => info!("Server started on {}", address),
            ServerEvent::AcceptError { error } => warn!("Accept failed: {}", error),
            ServerEvent::ShuttingDown { sessions } => {
                info!("Server shutting down, notifying {} session(s)", sessions)
            }
            ServerEvent::Stopped => info!("Server stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_messages_are_logged() {
        let observer = LoggingObserver;
        let id = SessionId::new(4);

        observer.on_connect(id).await;
        observer.on_message(MessageEvent::inbound(id, "hi")).await;
        observer.on_message(MessageEvent::outbound(id, "Hello!")).await;
        observer.on_disconnect(id, DisconnectReason::Requested).await;

        assert!(logs_contain("Client4 connected"));
        assert!(logs_contain("Client4: hi"));
        assert!(logs_contain("Server to Client4: Hello!"));
        assert!(logs_contain("Client4 disconnected"));
    }
}
