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

//! Parley Chat Server
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug PARLEY_BIND=127.0.0.1:5000 cargo run -p parley-server
//! ```
//!
//! Then connect with any line client, for example:
//! ```bash
//! nc localhost 5000
//! ```

mod config;
mod observer;

use observer::LoggingObserver;
use parley_service::ChatServer;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::load()?;
    let server = ChatServer::new(config)?;
    let address = server.start(Arc::new(LoggingObserver)).await?;
    info!("Parley chat server running on {}, press Ctrl+C to stop", address);

    tokio::signal::ctrl_c().await?;

    server.shutdown().await?;
    let metrics = server.metrics().snapshot();
    info!(
        sessions = metrics.total_sessions,
        messages = metrics.messages_received,
        errors = metrics.total_errors(),
        "Final statistics"
    );

    Ok(())
}
