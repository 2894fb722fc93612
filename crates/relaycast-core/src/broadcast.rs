//! Broadcast fan-out engine
//!
//! Delivers one payload to every registered connection. Delivery is
//! best-effort: a failure on one connection is logged and skipped, never
//! aborts the rest of the fan-out, and never surfaces as an error to the
//! caller. The fan-out iterates a registry snapshot taken at call time, so
//! joins and leaves that land mid-broadcast do not affect the membership
//! being served.

use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

/// Deliver `payload` to every connection registered at call time
///
/// Returns the number of successful deliveries; callers are free to ignore
/// it, it exists for observability and tests.
pub fn broadcast(registry: &ConnectionRegistry, payload: &str) -> usize {
    let snapshot = registry.snapshot();
    let recipients = snapshot.len();
    let mut delivered = 0;

    // Lock released; sends cannot block registry mutation.
    for handle in &snapshot {
        if handle.send_text(payload) {
            delivered += 1;
        } else {
            warn!(
                conn = %handle.id(),
                addr = %handle.remote_addr(),
                "dropping broadcast for unreachable connection"
            );
        }
    }

    debug!(recipients, delivered, "broadcast fan-out complete");
    delivered
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionHandle, ConnectionId, OutboundFrame};
    use tokio::sync::mpsc;

    fn live_handle() -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(ConnectionId::new(), "127.0.0.1:1", tx);
        (handle, rx)
    }

    fn dead_handle() -> ConnectionHandle {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        ConnectionHandle::new(ConnectionId::new(), "127.0.0.1:2", tx)
    }

    #[tokio::test]
    async fn delivers_to_every_registered_connection() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = live_handle();
        let (b, mut rx_b) = live_handle();
        registry.add(a).unwrap();
        registry.add(b).unwrap();

        let delivered = broadcast(&registry, "hello");

        assert_eq!(delivered, 2);
        assert_eq!(
            rx_a.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );
        assert_eq!(
            rx_b.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );
    }

    #[tokio::test]
    async fn one_dead_connection_does_not_abort_the_fan_out() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = live_handle();
        let (b, mut rx_b) = live_handle();
        registry.add(a).unwrap();
        registry.add(dead_handle()).unwrap();
        registry.add(b).unwrap();

        let delivered = broadcast(&registry, "still here");

        assert_eq!(delivered, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[test]
    fn empty_registry_broadcast_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        assert_eq!(broadcast(&registry, "nobody home"), 0);
    }

    #[tokio::test]
    async fn sender_is_not_excluded() {
        // The server rebroadcasts to all connections including the sender;
        // the engine itself has no notion of a sender at all.
        let registry = ConnectionRegistry::new();
        let (sender, mut rx_sender) = live_handle();
        registry.add(sender.clone()).unwrap();

        broadcast(&registry, &format!("[{}] hi", sender.remote_addr()));

        assert_eq!(
            rx_sender.recv().await,
            Some(OutboundFrame::Text("[127.0.0.1:1] hi".to_string()))
        );
    }
}
