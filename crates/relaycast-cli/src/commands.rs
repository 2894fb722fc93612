//! Command execution and dispatching

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use relaycast_core::RelayError;
use relaycast_net::{RelayClient, RelayServer};

use crate::cli::{Cli, Commands, ServerAction};
use crate::config::AppConfig;
use crate::error::Result;

/// How long the client waits for its close handshake to finish
const CLIENT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Routes parsed commands to their implementations
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute the parsed command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::BroadcastServer { action } => match action {
                ServerAction::Start { bind } => Self::run_server(config, bind).await,
                ServerAction::Connect { url, alias } => {
                    Self::run_client(config, url, alias).await
                }
            },
        }
    }

    // ------------------------------------------------------------------------
    // Server Command
    // ------------------------------------------------------------------------

    async fn run_server(mut config: AppConfig, bind: Option<String>) -> Result<()> {
        if let Some(bind) = bind {
            config.relay.bind_addr = bind;
        }
        let timeout = config.relay.shutdown_timeout();

        let server = Arc::new(RelayServer::bind(config.relay).await?);
        info!(addr = %server.local_addr()?, "press Ctrl-C to stop the server");

        let runner = Arc::clone(&server);
        let accept_loop = tokio::spawn(async move { runner.run().await });

        tokio::signal::ctrl_c().await?;
        server.shutdown(timeout).await?;

        if let Ok(result) = accept_loop.await {
            result?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Client Command
    // ------------------------------------------------------------------------

    async fn run_client(
        mut config: AppConfig,
        url: Option<String>,
        alias: Option<String>,
    ) -> Result<()> {
        if let Some(url) = url {
            config.relay.server_url = url;
        }

        let mut input = BufReader::new(tokio::io::stdin()).lines();

        let alias = match alias {
            Some(alias) => alias,
            None => {
                println!("Please enter your name:");
                match input.next_line().await? {
                    Some(line) if !line.trim().is_empty() => line.trim().to_string(),
                    _ => "Anonymous".to_string(),
                }
            }
        };

        let client = RelayClient::connect(&config.relay.server_url, &alias, &config.relay).await?;
        println!("Connected as {}. Type a message, or \"exit\" to leave.", alias);

        loop {
            tokio::select! {
                line = input.next_line() => match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if line == "exit" {
                            client.disconnect()?;
                            let _ = tokio::time::timeout(
                                CLIENT_CLOSE_GRACE,
                                client.wait_closed(),
                            )
                            .await;
                            break;
                        }
                        match client.send_line(line) {
                            Ok(()) => {}
                            Err(RelayError::NotConnected) => {
                                warn!("not connected; message dropped");
                            }
                            Err(e) => {
                                error!(error = %e, "failed to send message");
                            }
                        }
                    }
                    // Stdin closed; leave gracefully.
                    None => {
                        client.disconnect()?;
                        let _ = tokio::time::timeout(
                            CLIENT_CLOSE_GRACE,
                            client.wait_closed(),
                        )
                        .await;
                        break;
                    }
                },
                // Resolves only on a real close; a transport error leaves
                // the input loop running.
                _ = client.closed_event() => {
                    info!("connection closed; exiting");
                    break;
                }
            }
        }

        Ok(())
    }
}
