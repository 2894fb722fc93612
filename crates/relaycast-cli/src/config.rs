//! CLI configuration loading
//!
//! Wraps the shared [`RelayConfig`] in a `relaycast.toml`-shaped file so the
//! server and client sections stay extensible. Priority ordering is CLI args
//! over config file over defaults; the command dispatcher applies the CLI
//! overrides after loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use relaycast_core::RelayConfig;

use crate::error::{CliError, Result};

/// Complete configuration for the relaycast CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay endpoint and tuning shared by the server and client commands
    pub relay: RelayConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.relay.validate().map_err(CliError::Config)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relay.bind_addr, "127.0.0.1:8887");
    }

    #[test]
    fn partial_relay_section_fills_in_defaults() {
        let config: AppConfig =
            toml::from_str("[relay]\nserver_url = \"ws://10.0.0.5:8887\"").unwrap();
        assert_eq!(config.relay.server_url, "ws://10.0.0.5:8887");
        assert_eq!(config.relay.bind_addr, "127.0.0.1:8887");
    }

    #[test]
    fn invalid_relay_section_is_rejected() {
        let config: AppConfig =
            toml::from_str("[relay]\nserver_url = \"http://10.0.0.5:8887\"").unwrap();
        assert!(config.validate().is_err());
    }
}
