//! Broadcast relay server
//!
//! [`RelayServer`] owns the listener, the shared [`ConnectionRegistry`] and
//! the set of per-connection session tasks. Each accepted socket gets its own
//! task running the socket pump with a [`ServerSession`] handler, which
//! drives the connection's lifecycle state machine and executes the effects
//! it emits against the registry and the broadcast engine.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use relaycast_core::{
    broadcast, ConnectionHandle, ConnectionId, ConnectionRegistry, LinkEffect, LinkEvent,
    LinkState, Notice, RelayConfig, RelayError, Result, Role,
};

use crate::events::{CloseInfo, SessionEvents};

// ----------------------------------------------------------------------------
// Relay Server
// ----------------------------------------------------------------------------

/// WebSocket broadcast relay server
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    config: RelayConfig,
    shutdown: watch::Sender<bool>,
    sessions: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayServer {
    /// Bind the listener without accepting connections yet
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate().map_err(RelayError::transport)?;

        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
            config,
            shutdown,
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of connections currently registered
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Shared connection registry
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until [`RelayServer::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "relay server listening");

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        // The flag is checked under the sessions lock, and
                        // shutdown flips it before draining: a racing
                        // shutdown either drains this push or this check
                        // sees the flag and the socket is dropped unserved.
                        let mut sessions =
                            self.sessions.lock().expect("session list lock poisoned");
                        if *shutdown_rx.borrow() {
                            debug!(%peer_addr, "refusing connection during shutdown");
                            break;
                        }
                        sessions.retain(|s| !s.is_finished());
                        let registry = Arc::clone(&self.registry);
                        let config = self.config.clone();
                        sessions.push(tokio::spawn(handle_session(
                            stream, peer_addr, registry, config,
                        )));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("accept loop stopped");
        Ok(())
    }

    /// Stop accepting, close every live connection, wait up to `timeout`
    ///
    /// Idempotent: a second call returns immediately.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        if *self.shutdown.borrow() {
            return Ok(());
        }
        info!("shutting down relay server");
        let _ = self.shutdown.send(true);

        for handle in self.registry.snapshot() {
            handle.request_close();
        }

        let sessions: Vec<JoinHandle<()>> = self
            .sessions
            .lock()
            .expect("session list lock poisoned")
            .drain(..)
            .collect();

        let deadline = Instant::now() + timeout;
        for mut session in sessions {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut session).await {
                Ok(_) => {}
                Err(_) => session.abort(),
            }
        }

        info!("relay server stopped");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Per-Connection Session Task
// ----------------------------------------------------------------------------

async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    config: RelayConfig,
) {
    let id = ConnectionId::new();
    let remote_addr = peer_addr.to_string();
    debug!(conn = %id, addr = %remote_addr, "connection accepted");

    let (tx, rx) = mpsc::channel(config.outbound_capacity);
    let handle = ConnectionHandle::new(id, remote_addr.clone(), tx);
    let link = LinkState::connecting(id, Role::Server, remote_addr);
    let mut session = ServerSession {
        link,
        handle,
        registry,
    };

    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            session.apply(LinkEvent::TransportFailed {
                reason: format!("websocket handshake failed: {e}"),
            });
            return;
        }
    };

    crate::events::pump_socket(ws, rx, Some(config.keepalive_interval()), &mut session).await;
}

/// Lifecycle driver for one server-side connection
struct ServerSession {
    link: LinkState,
    handle: ConnectionHandle,
    registry: Arc<ConnectionRegistry>,
}

impl ServerSession {
    /// Feed one event through the state machine and execute its effects
    fn apply(&mut self, event: LinkEvent) {
        match self.link.clone().transition(event) {
            Ok(transition) => {
                debug!(
                    conn = %self.link.id(),
                    from = transition.from_state,
                    to = transition.to_state,
                    event = transition.event,
                    "lifecycle transition"
                );
                self.link = transition.new_state;
                for effect in transition.effects {
                    self.execute(effect);
                }
            }
            Err(e) => error!(error = %e, "rejected lifecycle event"),
        }
    }

    fn execute(&self, effect: LinkEffect) {
        let addr = self.handle.remote_addr();
        match effect {
            LinkEffect::Register => {
                if let Err(e) = self.registry.add(self.handle.clone()) {
                    error!(error = %e, "failed to register connection");
                }
            }
            LinkEffect::Deregister => {
                self.registry.remove(&self.handle.id());
            }
            LinkEffect::BroadcastJoin => {
                info!(%addr, "new client connected");
                broadcast(&self.registry, &Notice::joined(addr).to_string());
            }
            LinkEffect::BroadcastLeave => {
                info!(%addr, "client disconnected");
                broadcast(&self.registry, &Notice::left(addr).to_string());
            }
            LinkEffect::BroadcastTagged { text } => {
                info!(%addr, "relaying message");
                broadcast(&self.registry, &Notice::message(addr, &text).to_string());
            }
            LinkEffect::LogError { reason } => {
                error!(conn = %self.handle.id(), %addr, %reason, "transport error");
            }
            // Client-side effects; never emitted for Role::Server.
            LinkEffect::Announce | LinkEffect::PrintBroadcast { .. } | LinkEffect::SignalShutdown => {
            }
        }
    }
}

#[async_trait]
impl SessionEvents for ServerSession {
    async fn on_open(&mut self) {
        self.apply(LinkEvent::HandshakeFinished);
    }

    async fn on_message(&mut self, text: String) {
        self.apply(LinkEvent::MessageReceived { text });
    }

    async fn on_close(&mut self, info: CloseInfo) {
        self.apply(LinkEvent::TransportClosed {
            code: info.code,
            reason: info.reason,
            by_peer: info.by_peer,
        });
    }

    async fn on_error(&mut self, reason: String) {
        self.apply(LinkEvent::TransportFailed { reason });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
