//! Core logic for the relaycast broadcast relay
//!
//! This crate contains the transport-independent parts of the relay: the
//! connection registry, the broadcast fan-out engine, the connection
//! lifecycle state machine shared by server and client, and the notice
//! formats that go over the wire. Network I/O lives in `relaycast-net`;
//! this crate only depends on tokio's channel types so the logic can be
//! tested without sockets.

pub mod broadcast;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod notice;
pub mod registry;
pub mod types;

pub use broadcast::broadcast;
pub use config::RelayConfig;
pub use errors::{RelayError, Result};
pub use lifecycle::{
    LinkEffect, LinkEvent, LinkState, Role, Transition, TransitionError,
};
pub use notice::Notice;
pub use registry::ConnectionRegistry;
pub use types::{ConnectionHandle, ConnectionId, OutboundFrame};
