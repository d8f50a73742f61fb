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

//! Interactive Chat Client Example
//!
//! Reads lines from stdin, sends them to the server and prints every reply.
//! Typing `SHUTDOWN` or closing stdin ends the session.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p parley-server
//! cargo run -p parley-client --example chat_client
//! ```

use parley_client::{ChatClient, ClientConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

enum Event {
    Input(Option<String>),
    Reply(Option<String>),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::new("127.0.0.1", 5000);
    let mut client = ChatClient::connect(config).await?;
    println!("Connected to server as {}", client.session_name());

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let event = tokio::select! {
            line = input.next_line() => Event::Input(line?),
            reply = client.next_line() => Event::Reply(reply?),
        };

        match event {
            Event::Input(Some(line)) if line.eq_ignore_ascii_case(&client.config().disconnect_token) => {
                break;
            }
            Event::Input(Some(line)) => {
                client.send_line(&line).await?;
                if !line.is_empty() {
                    println!("Me: {line}");
                }
            }
            Event::Input(None) => break,
            Event::Reply(Some(reply)) => println!("{reply}"),
            Event::Reply(None) => {
                println!("Server closed the connection.");
                return Ok(());
            }
        }
    }

    client.disconnect().await?;
    println!("Disconnected.");
    Ok(())
}
