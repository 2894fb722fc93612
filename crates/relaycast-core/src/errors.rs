//! Error types for the relaycast core
//!
//! The taxonomy distinguishes fatal startup failures (bind, connect) from
//! recoverable per-session conditions (send attempted outside `Open`) and
//! programming-invariant violations (duplicate registry insert). Delivery
//! failures during a broadcast fan-out are deliberately *not* represented
//! here: the broadcast engine recovers from them internally and never
//! surfaces an error to its caller.

use crate::lifecycle::TransitionError;
use crate::types::ConnectionId;

/// Core error type for the relay
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The listen address is unavailable at startup; fatal
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server could not be reached; fatal to the connect attempt
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// A send was attempted while the connection is not `Open`; recoverable
    #[error("not connected; message was not sent")]
    NotConnected,

    /// Registry invariant violation; a defect signal, not a user-facing error
    #[error("connection {id} is already registered")]
    DuplicateConnection { id: ConnectionId },

    /// An event arrived that the lifecycle state machine does not accept
    #[error("lifecycle error: {0}")]
    Transition(#[from] TransitionError),

    /// Transport-level failure translated at the session-controller boundary
    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a transport error with a reason
    pub fn transport<R: Into<String>>(reason: R) -> Self {
        RelayError::Transport {
            reason: reason.into(),
        }
    }
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
