//! Relay configuration
//!
//! Serde-backed so the CLI can load it from a TOML file; every field has a
//! working default (one local endpoint on port 8887, one-second graceful
//! shutdown).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the relay listens on by default
pub const DEFAULT_PORT: u16 = 8887;

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Configuration shared by the server and client controllers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the server listens on
    pub bind_addr: String,

    /// URL the client connects to
    pub server_url: String,

    /// How long a graceful server shutdown waits before forcing teardown
    pub shutdown_timeout_secs: u64,

    /// Interval between server keep-alive pings; half-dead connections
    /// surface as close or error events instead of lingering
    pub keepalive_interval_secs: u64,

    /// Capacity of each connection's outbound queue; a peer that falls this
    /// far behind starts losing broadcasts rather than blocking the fan-out
    pub outbound_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            server_url: format!("ws://127.0.0.1:{}", DEFAULT_PORT),
            shutdown_timeout_secs: 1,
            keepalive_interval_secs: 100,
            outbound_capacity: 64,
        }
    }
}

impl RelayConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.is_empty() {
            return Err("bind_addr must not be empty".to_string());
        }
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            return Err(format!(
                "server_url must be a ws:// or wss:// URL, got {}",
                self.server_url
            ));
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be at least 1".to_string());
        }
        if self.keepalive_interval_secs == 0 {
            return Err("keepalive_interval_secs must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_stock_endpoint() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8887");
        assert_eq!(config.server_url, "ws://127.0.0.1:8887");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: RelayConfig = toml::from_str("bind_addr = \"0.0.0.0:9001\"").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9001");
        assert_eq!(config.outbound_capacity, 64);
    }

    #[test]
    fn rejects_non_websocket_url() {
        let config = RelayConfig {
            server_url: "http://127.0.0.1:8887".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = RelayConfig {
            outbound_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
