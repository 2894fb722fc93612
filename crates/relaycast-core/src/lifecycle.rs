//! Connection lifecycle state machine
//!
//! One linear state machine governs a connection on both sides of the wire:
//! a state is consumed to transition, so a connection can never be in two
//! states at once and invalid transitions are rejected instead of silently
//! corrupting state. The machine is pure: it returns the new state plus a
//! list of [`LinkEffect`]s, and the session controller owning the connection
//! executes those effects (registry updates, broadcasts, console output).
//!
//! States: `Connecting → Open → Closing → Closed`, with `Errored` reachable
//! from `Connecting`, `Open` and `Closing` and terminal like `Closed`.

use std::fmt;

use crate::types::ConnectionId;

// ----------------------------------------------------------------------------
// Roles
// ----------------------------------------------------------------------------

/// Which side of the wire this connection lives on
///
/// Server and client react to the same transport events with different side
/// effects; the role decides which effects a transition emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

// ----------------------------------------------------------------------------
// Link State Types
// ----------------------------------------------------------------------------

/// Linear connection state that must be consumed to transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Handshake in flight
    Connecting(ConnectingLink),
    /// Handshake complete; payloads flow
    Open(OpenLink),
    /// Local shutdown requested, close frame in flight
    Closing(ClosingLink),
    /// Transport closed; terminal
    Closed(ClosedLink),
    /// Transport failed; terminal, equivalent to `Closed` for the registry
    Errored(ErroredLink),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectingLink {
    pub id: ConnectionId,
    pub role: Role,
    pub remote_addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLink {
    pub id: ConnectionId,
    pub role: Role,
    pub remote_addr: String,
    /// Inbound payloads seen while open
    pub message_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingLink {
    pub id: ConnectionId,
    pub role: Role,
    pub remote_addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedLink {
    pub id: ConnectionId,
    pub role: Role,
    pub remote_addr: String,
    pub code: u16,
    pub reason: String,
    /// Whether the peer, rather than the local side, initiated the close
    pub by_peer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErroredLink {
    pub id: ConnectionId,
    pub role: Role,
    pub remote_addr: String,
    pub reason: String,
}

// ----------------------------------------------------------------------------
// Events and Effects
// ----------------------------------------------------------------------------

/// External triggers for state transitions
///
/// Each transition is caused by exactly one transport callback or one local
/// action, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Transport handshake completed successfully
    HandshakeFinished,
    /// A complete text payload arrived from the peer
    MessageReceived { text: String },
    /// The local side requested a graceful shutdown
    CloseRequested,
    /// The transport closed, on either side's initiative
    TransportClosed {
        code: u16,
        reason: String,
        by_peer: bool,
    },
    /// The transport failed with an error
    TransportFailed { reason: String },
}

impl LinkEvent {
    fn name(&self) -> &'static str {
        match self {
            LinkEvent::HandshakeFinished => "HandshakeFinished",
            LinkEvent::MessageReceived { .. } => "MessageReceived",
            LinkEvent::CloseRequested => "CloseRequested",
            LinkEvent::TransportClosed { .. } => "TransportClosed",
            LinkEvent::TransportFailed { .. } => "TransportFailed",
        }
    }
}

/// Side effects a transition asks the session controller to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEffect {
    /// Server: insert the connection's handle into the registry
    Register,
    /// Server: remove the connection from the registry (idempotent)
    Deregister,
    /// Server: broadcast the join notice for this connection
    BroadcastJoin,
    /// Server: broadcast the leave notice for this connection
    BroadcastLeave,
    /// Server: tag an inbound payload with the sender address and fan it out
    BroadcastTagged { text: String },
    /// Client: send the alias announcement payload
    Announce,
    /// Client: print a relayed broadcast to the console
    PrintBroadcast { text: String },
    /// Client: signal the input loop to terminate
    SignalShutdown,
    /// Log a transport failure
    LogError { reason: String },
}

// ----------------------------------------------------------------------------
// Transition Results
// ----------------------------------------------------------------------------

/// Result of consuming a state with an event
#[derive(Debug, Clone)]
pub struct Transition {
    /// The state the connection is now in
    pub new_state: LinkState,
    /// Effects for the session controller to execute, in order
    pub effects: Vec<LinkEffect>,
    /// Names of the states involved, for diagnostics
    pub from_state: &'static str,
    pub to_state: &'static str,
    pub event: &'static str,
}

/// Errors from invalid transitions
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransitionError {
    #[error("event {event} is not valid in state {from_state} for connection {id}")]
    InvalidTransition {
        id: ConnectionId,
        from_state: &'static str,
        event: &'static str,
    },
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl LinkState {
    /// Initial state for a connection whose handshake is starting
    pub fn connecting(id: ConnectionId, role: Role, remote_addr: impl Into<String>) -> Self {
        LinkState::Connecting(ConnectingLink {
            id,
            role,
            remote_addr: remote_addr.into(),
        })
    }

    /// Connection identity, in any state
    pub fn id(&self) -> ConnectionId {
        match self {
            LinkState::Connecting(s) => s.id,
            LinkState::Open(s) => s.id,
            LinkState::Closing(s) => s.id,
            LinkState::Closed(s) => s.id,
            LinkState::Errored(s) => s.id,
        }
    }

    /// Which side of the wire this connection lives on
    pub fn role(&self) -> Role {
        match self {
            LinkState::Connecting(s) => s.role,
            LinkState::Open(s) => s.role,
            LinkState::Closing(s) => s.role,
            LinkState::Closed(s) => s.role,
            LinkState::Errored(s) => s.role,
        }
    }

    /// Remote address, in any state
    pub fn remote_addr(&self) -> &str {
        match self {
            LinkState::Connecting(s) => &s.remote_addr,
            LinkState::Open(s) => &s.remote_addr,
            LinkState::Closing(s) => &s.remote_addr,
            LinkState::Closed(s) => &s.remote_addr,
            LinkState::Errored(s) => &s.remote_addr,
        }
    }

    /// State name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            LinkState::Connecting(_) => "Connecting",
            LinkState::Open(_) => "Open",
            LinkState::Closing(_) => "Closing",
            LinkState::Closed(_) => "Closed",
            LinkState::Errored(_) => "Errored",
        }
    }

    /// Whether outbound sends are allowed
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open(_))
    }

    /// Whether the connection has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkState::Closed(_) | LinkState::Errored(_))
    }

    /// Process an event and transition to a new state (consumes self)
    pub fn transition(self, event: LinkEvent) -> Result<Transition, TransitionError> {
        let from_state = self.state_name();
        let event_name = event.name();

        let (new_state, effects) = match (self, event) {
            // From Connecting
            (LinkState::Connecting(link), LinkEvent::HandshakeFinished) => {
                let effects = match link.role {
                    Role::Server => vec![LinkEffect::Register, LinkEffect::BroadcastJoin],
                    Role::Client => vec![LinkEffect::Announce],
                };
                let new_state = LinkState::Open(OpenLink {
                    id: link.id,
                    role: link.role,
                    remote_addr: link.remote_addr,
                    message_count: 0,
                });
                (new_state, effects)
            }

            // From Open: inbound payload, self-loop
            (LinkState::Open(mut link), LinkEvent::MessageReceived { text }) => {
                link.message_count += 1;
                let effects = match link.role {
                    Role::Server => vec![LinkEffect::BroadcastTagged { text }],
                    Role::Client => vec![LinkEffect::PrintBroadcast { text }],
                };
                (LinkState::Open(link), effects)
            }

            // From Open: local shutdown intent; no registry change yet
            (LinkState::Open(link), LinkEvent::CloseRequested) => {
                let new_state = LinkState::Closing(ClosingLink {
                    id: link.id,
                    role: link.role,
                    remote_addr: link.remote_addr,
                });
                (new_state, Vec::new())
            }

            // From Open or Closing: the transport finished closing
            (
                LinkState::Open(OpenLink {
                    id,
                    role,
                    remote_addr,
                    ..
                })
                | LinkState::Closing(ClosingLink {
                    id,
                    role,
                    remote_addr,
                }),
                LinkEvent::TransportClosed {
                    code,
                    reason,
                    by_peer,
                },
            ) => {
                let effects = match role {
                    Role::Server => vec![LinkEffect::Deregister, LinkEffect::BroadcastLeave],
                    Role::Client => vec![LinkEffect::SignalShutdown],
                };
                let new_state = LinkState::Closed(ClosedLink {
                    id,
                    role,
                    remote_addr,
                    code,
                    reason,
                    by_peer,
                });
                (new_state, effects)
            }

            // From Connecting, Open or Closing: transport failure. Closing is
            // included because the close and error paths race; the registry
            // removal is idempotent for the same reason.
            (
                LinkState::Connecting(ConnectingLink {
                    id,
                    role,
                    remote_addr,
                })
                | LinkState::Open(OpenLink {
                    id,
                    role,
                    remote_addr,
                    ..
                })
                | LinkState::Closing(ClosingLink {
                    id,
                    role,
                    remote_addr,
                }),
                LinkEvent::TransportFailed { reason },
            ) => {
                let effects = match role {
                    // Deregister defensively even if the connection never
                    // reached the registry.
                    Role::Server => vec![
                        LinkEffect::Deregister,
                        LinkEffect::LogError {
                            reason: reason.clone(),
                        },
                    ],
                    // An error alone does not terminate the client; only a
                    // close event does.
                    Role::Client => vec![LinkEffect::LogError {
                        reason: reason.clone(),
                    }],
                };
                let new_state = LinkState::Errored(ErroredLink {
                    id,
                    role,
                    remote_addr,
                    reason,
                });
                (new_state, effects)
            }

            // Everything else is a programming error in the caller
            (state, event) => {
                return Err(TransitionError::InvalidTransition {
                    id: state.id(),
                    from_state,
                    event: event.name(),
                });
            }
        };

        Ok(Transition {
            from_state,
            to_state: new_state.state_name(),
            event: event_name,
            new_state,
            effects,
        })
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.state_name(), self.remote_addr())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
