//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Broadcast relay operations
    BroadcastServer {
        #[command(subcommand)]
        action: ServerAction,
    },
}

#[derive(Subcommand)]
pub enum ServerAction {
    /// Start the relay server
    Start {
        /// Address to listen on (overrides the configuration file)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Connect to a running relay server and chat
    Connect {
        /// Server URL (overrides the configuration file)
        #[arg(short, long)]
        url: Option<String>,

        /// Alias to announce; prompted for interactively when omitted
        #[arg(short, long)]
        alias: Option<String>,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
