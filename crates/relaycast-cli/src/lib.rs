//! relaycast CLI library
//!
//! Components of the relaycast command-line interface: argument parsing,
//! configuration loading and the command dispatcher that drives the relay
//! server and client.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands, ServerAction};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};

// Re-export commonly used types
pub use relaycast_core::{RelayConfig, RelayError};
pub use relaycast_net::{RelayClient, RelayServer};
