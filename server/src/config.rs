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

//! Server configuration from the environment

use parley_service::{Result, ServerConfig, ServiceError};
use std::net::SocketAddr;

/// Environment variable overriding the bind address
pub const BIND_ENV: &str = "PARLEY_BIND";

/// Build the server configuration
///
/// Starts from [`ServerConfig::default`] and applies `PARLEY_BIND` when set.
pub fn load() -> Result<ServerConfig> {
    from_bind_override(std::env::var(BIND_ENV).ok().as_deref())
}

fn from_bind_override(bind: Option<&str>) -> Result<ServerConfig> {
    let config = match bind.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let address: SocketAddr = value.parse().map_err(|e| {
                ServiceError::InvalidConfig(format!("{BIND_ENV}={value:?} is not an address: {e}"))
            })?;
            ServerConfig::new(address)
        }
        None => ServerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_service::DEFAULT_PORT;

    #[test]
    fn test_default_without_override() {
        let config = from_bind_override(None).unwrap();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);

        let config = from_bind_override(Some("  ")).unwrap();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_bind_override() {
        let config = from_bind_override(Some("127.0.0.1:6000")).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:6000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_invalid_bind_override() {
        let result = from_bind_override(Some("localhost"));
        assert!(matches!(result, Err(ServiceError::InvalidConfig(_))));
    }
}
