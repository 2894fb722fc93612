//! WebSocket transport glue for the relaycast broadcast relay
//!
//! Adapts tokio-tungstenite sockets to the event interface the lifecycle
//! state machine in `relaycast-core` expects, and provides the two session
//! controllers built on top of it: [`RelayServer`] and [`RelayClient`].

pub mod client;
pub mod events;
pub mod server;

pub use client::RelayClient;
pub use events::{CloseInfo, SessionEvents};
pub use server::RelayServer;
