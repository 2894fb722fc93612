//! Broadcast relay client
//!
//! [`RelayClient`] connects to a relay server, announces its alias, and then
//! relays signed chat lines while printing every broadcast it receives. The
//! connection's lifecycle state machine lives behind a mutex shared between
//! the caller and the session task: outbound sends are gated on the state
//! being `Open`, and the session task advances the state as transport events
//! arrive.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info};
use url::Url;

use relaycast_core::{
    notice, LinkEffect, LinkEvent, LinkState, OutboundFrame, RelayConfig, RelayError, Result, Role,
};

use crate::events::{CloseInfo, SessionEvents};

// ----------------------------------------------------------------------------
// Relay Client
// ----------------------------------------------------------------------------

/// Client side of one relay connection
pub struct RelayClient {
    state: Arc<Mutex<LinkState>>,
    outbound: mpsc::Sender<OutboundFrame>,
    closed: watch::Receiver<bool>,
    alias: String,
    pump: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to a relay server and announce `alias`
    ///
    /// Returns only once the connection is `Open`; the alias announcement is
    /// queued before the first caller can send.
    pub async fn connect(url: &str, alias: &str, config: &RelayConfig) -> Result<Self> {
        Url::parse(url).map_err(|e| RelayError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let (ws, _response) = connect_async(url).await.map_err(|e| RelayError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        info!(%url, "connected to relay server");

        let (tx, rx) = mpsc::channel(config.outbound_capacity);
        let (closed_tx, closed_rx) = watch::channel(false);
        let state = Arc::new(Mutex::new(LinkState::connecting(
            relaycast_core::ConnectionId::new(),
            Role::Client,
            url,
        )));

        // The transport handshake already completed, so drive the state to
        // Open here; the session task's on_open is then a no-op and callers
        // never observe a Connecting client.
        {
            let mut link = state.lock().expect("client state lock poisoned");
            let transition = link.clone().transition(LinkEvent::HandshakeFinished)?;
            *link = transition.new_state;
            for effect in transition.effects {
                if let LinkEffect::Announce = effect {
                    let _ = tx.try_send(OutboundFrame::Text(notice::announcement(alias)));
                }
            }
        }

        let mut session = ClientSession {
            state: Arc::clone(&state),
            closed: closed_tx,
        };
        let pump = tokio::spawn(async move {
            crate::events::pump_socket(ws, rx, None, &mut session).await;
        });

        Ok(Self {
            state,
            outbound: tx,
            closed: closed_rx,
            alias: alias.to_string(),
            pump,
        })
    }

    /// Alias announced to the server
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Whether the connection is currently `Open`
    pub fn is_open(&self) -> bool {
        self.state.lock().expect("client state lock poisoned").is_open()
    }

    /// Current lifecycle state name, for diagnostics
    pub fn state_name(&self) -> &'static str {
        self.state
            .lock()
            .expect("client state lock poisoned")
            .state_name()
    }

    /// Send one chat line, signed with the alias
    ///
    /// Rejected with [`RelayError::NotConnected`] unless the connection is
    /// `Open`; nothing reaches the wire on rejection.
    pub fn send_line(&self, text: &str) -> Result<()> {
        {
            let link = self.state.lock().expect("client state lock poisoned");
            if !link.is_open() {
                return Err(RelayError::NotConnected);
            }
        }
        self.outbound
            .try_send(OutboundFrame::Text(notice::signed_line(&self.alias, text)))
            .map_err(|e| RelayError::transport(format!("outbound queue unavailable: {e}")))
    }

    /// Request a graceful close
    ///
    /// Moves the state to `Closing` and queues a close frame; the terminal
    /// transition happens when the close completes on the wire. A no-op when
    /// the connection is already past `Open`.
    pub fn disconnect(&self) -> Result<()> {
        {
            let mut link = self.state.lock().expect("client state lock poisoned");
            if !link.is_open() {
                return Ok(());
            }
            let transition = link.clone().transition(LinkEvent::CloseRequested)?;
            *link = transition.new_state;
        }
        // If the queue is already gone the pump is tearing down anyway.
        let _ = self.outbound.try_send(OutboundFrame::Close);
        Ok(())
    }

    /// Watch that flips to `true` once the transport has closed
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    /// Resolve once the transport has closed
    ///
    /// Never resolves when the session ended without a close event (a
    /// transport error logs and leaves the caller's loop running), so this
    /// is safe to poll repeatedly inside a select loop.
    pub async fn closed_event(&self) {
        let mut closed = self.closed.clone();
        loop {
            if *closed.borrow() {
                return;
            }
            if closed.changed().await.is_err() {
                // Sender gone with no close event; pend instead of
                // completing, a completed arm here would spin the caller.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait until the transport has closed
    pub async fn wait_closed(&self) {
        let mut closed = self.closed.clone();
        while !*closed.borrow() {
            if closed.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ----------------------------------------------------------------------------
// Client Session
// ----------------------------------------------------------------------------

/// Lifecycle driver for the client side of the connection
struct ClientSession {
    state: Arc<Mutex<LinkState>>,
    closed: watch::Sender<bool>,
}

impl ClientSession {
    fn apply(&mut self, event: LinkEvent) {
        let mut link = self.state.lock().expect("client state lock poisoned");
        match link.clone().transition(event) {
            Ok(transition) => {
                debug!(
                    from = transition.from_state,
                    to = transition.to_state,
                    event = transition.event,
                    "lifecycle transition"
                );
                *link = transition.new_state;
                drop(link);
                for effect in transition.effects {
                    self.execute(effect);
                }
            }
            Err(e) => error!(error = %e, "rejected lifecycle event"),
        }
    }

    fn execute(&self, effect: LinkEffect) {
        match effect {
            LinkEffect::PrintBroadcast { text } => {
                // Leading newline lifts the broadcast off the prompt line.
                println!("\n<BROADCAST> {}", text);
            }
            LinkEffect::SignalShutdown => {
                let _ = self.closed.send(true);
            }
            LinkEffect::LogError { reason } => {
                error!(%reason, "transport error");
            }
            // Announce is handled during connect; the remaining effects are
            // server-side.
            LinkEffect::Announce
            | LinkEffect::Register
            | LinkEffect::Deregister
            | LinkEffect::BroadcastJoin
            | LinkEffect::BroadcastLeave
            | LinkEffect::BroadcastTagged { .. } => {}
        }
    }
}

#[async_trait]
impl SessionEvents for ClientSession {
    async fn on_open(&mut self) {
        // The state was driven to Open during connect.
        debug!("client session running");
    }

    async fn on_message(&mut self, text: String) {
        self.apply(LinkEvent::MessageReceived { text });
    }

    async fn on_close(&mut self, info: CloseInfo) {
        info!(code = info.code, reason = %info.reason, by_peer = info.by_peer, "disconnected from server");
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

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::ConnectionId;

    fn client_in_state(link: LinkState) -> (RelayClient, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(4);
        let (_closed_tx, closed_rx) = watch::channel(false);
        let client = RelayClient {
            state: Arc::new(Mutex::new(link)),
            outbound: tx,
            closed: closed_rx,
            alias: "alice".to_string(),
            pump: tokio::spawn(async {}),
        };
        (client, rx)
    }

    #[tokio::test]
    async fn send_outside_open_is_rejected_and_queues_nothing() {
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test");
        let (client, mut rx) = client_in_state(link);

        let err = client.send_line("hello").unwrap_err();
        assert!(matches!(err, RelayError::NotConnected));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn open_client_sends_signed_line() {
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test")
            .transition(LinkEvent::HandshakeFinished)
            .unwrap()
            .new_state;
        let (client, mut rx) = client_in_state(link);

        client.send_line("hi there").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Text("alice: hi there".to_string())
        );
    }

    #[tokio::test]
    async fn disconnect_moves_to_closing_and_queues_close() {
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test")
            .transition(LinkEvent::HandshakeFinished)
            .unwrap()
            .new_state;
        let (client, mut rx) = client_in_state(link);

        client.disconnect().unwrap();
        assert_eq!(client.state_name(), "Closing");
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Close);

        // Sends after a close request are rejected.
        assert!(matches!(
            client.send_line("late").unwrap_err(),
            RelayError::NotConnected
        ));
        // And a second disconnect is a no-op.
        client.disconnect().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_event_resolves_when_the_transport_closes() {
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test")
            .transition(LinkEvent::HandshakeFinished)
            .unwrap()
            .new_state;
        let (tx, _rx) = mpsc::channel(4);
        let (closed_tx, closed_rx) = watch::channel(false);
        let client = RelayClient {
            state: Arc::new(Mutex::new(link)),
            outbound: tx,
            closed: closed_rx,
            alias: "alice".to_string(),
            pump: tokio::spawn(async {}),
        };

        closed_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), client.closed_event())
            .await
            .expect("closed_event never resolved");
    }

    #[tokio::test]
    async fn dead_session_leaves_closed_event_pending() {
        // The session task dropping its watch sender without a close event
        // must not complete the close signal; a caller selecting on it would
        // otherwise loop without ever observing a state change.
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test")
            .transition(LinkEvent::HandshakeFinished)
            .unwrap()
            .new_state;
        let (client, _rx) = client_in_state(link);
        // client_in_state drops the watch sender before returning.

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            client.closed_event(),
        )
        .await;
        assert!(outcome.is_err(), "closed_event completed on a dead watch");
    }

    #[tokio::test]
    async fn transport_error_does_not_flip_the_closed_watch() {
        let link = LinkState::connecting(ConnectionId::new(), Role::Client, "ws://relay.test")
            .transition(LinkEvent::HandshakeFinished)
            .unwrap()
            .new_state;
        let state = Arc::new(Mutex::new(link));
        let (closed_tx, closed_rx) = watch::channel(false);
        let mut session = ClientSession {
            state: Arc::clone(&state),
            closed: closed_tx,
        };

        session.on_error("connection reset".to_string()).await;

        assert!(!*closed_rx.borrow());
        assert_eq!(
            state.lock().unwrap().state_name(),
            "Errored"
        );
    }
}
