//! Connection identity and handle types
//!
//! The transport layer allocates a [`ConnectionId`] when a handshake begins;
//! the registry holds a [`ConnectionHandle`] for routing while the lifecycle
//! state machine holds the authoritative state for the same connection.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Connection Identity
// ----------------------------------------------------------------------------

/// Opaque identity for one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Outbound Frames
// ----------------------------------------------------------------------------

/// Unit of work queued towards a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A complete text payload to deliver to the peer
    Text(String),
    /// Request a graceful close of the underlying transport
    Close,
}

// ----------------------------------------------------------------------------
// Connection Handle
// ----------------------------------------------------------------------------

/// Registry entry for one live connection
///
/// The handle does not own the socket; it carries the sender half of the
/// per-connection outbound queue that the transport's writer side drains.
/// Cloning a handle clones the sender, not the connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote_addr: String,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    /// Create a handle for a connection with the given outbound queue
    pub fn new(
        id: ConnectionId,
        remote_addr: impl Into<String>,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            id,
            remote_addr: remote_addr.into(),
            outbound,
        }
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, for diagnostics and notice tagging
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Queue a text payload without blocking
    ///
    /// Returns `false` when the queue is full or the writer side is gone;
    /// the caller decides whether that failure matters (the broadcast engine
    /// logs and moves on).
    pub fn send_text(&self, payload: &str) -> bool {
        self.outbound
            .try_send(OutboundFrame::Text(payload.to_string()))
            .is_ok()
    }

    /// Queue a graceful close request
    pub fn request_close(&self) -> bool {
        self.outbound.try_send(OutboundFrame::Close).is_ok()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn handle_queues_text_frames() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(ConnectionId::new(), "127.0.0.1:9", tx);

        assert!(handle.send_text("hello"));
        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(ConnectionId::new(), "127.0.0.1:9", tx);
        drop(rx);

        assert!(!handle.send_text("hello"));
        assert!(!handle.request_close());
    }
}
