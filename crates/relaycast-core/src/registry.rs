//! Connection registry
//!
//! Tracks the set of currently open connections on the server. All mutation
//! and the snapshot read go through one mutex so concurrent opens, closes
//! and broadcasts never observe a torn membership set. The lock is never
//! held across I/O: callers take a [`ConnectionRegistry::snapshot`] and send
//! after the lock is released.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{RelayError, Result};
use crate::types::{ConnectionHandle, ConnectionId};

// ----------------------------------------------------------------------------
// Connection Registry
// ----------------------------------------------------------------------------

/// Thread-safe set of open connections, keyed by identity
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection
    ///
    /// Fails with [`RelayError::DuplicateConnection`] when the identity is
    /// already present. Under correct lifecycle use this cannot happen; a
    /// duplicate is a programming-invariant violation, not a recoverable
    /// condition.
    pub fn add(&self, handle: ConnectionHandle) -> Result<()> {
        let mut connections = self.inner.lock().expect("registry lock poisoned");
        let id = handle.id();
        if connections.contains_key(&id) {
            return Err(RelayError::DuplicateConnection { id });
        }
        connections.insert(id, handle);
        Ok(())
    }

    /// Remove a connection if present
    ///
    /// An absent identity is a no-op, not an error: the close and error
    /// paths may race to remove the same connection.
    pub fn remove(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .remove(id)
    }

    /// Immutable copy of the current membership
    ///
    /// Broadcast iteration happens over the snapshot after the lock is
    /// released, so sends never block registry mutation.
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Whether a connection is currently registered
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .contains_key(id)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
