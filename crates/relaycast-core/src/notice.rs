//! Wire notice formats
//!
//! Every payload the server fans out is plain text. The three notice shapes
//! below are the relay's entire "protocol": join and leave announcements
//! plus inbound messages tagged with the sender's remote address. The
//! client-side helpers produce the alias announcement and the signed line a
//! client sends while chatting.

use std::fmt;

// ----------------------------------------------------------------------------
// Server Notices
// ----------------------------------------------------------------------------

/// A broadcast payload produced by the server
///
/// Ephemeral: a notice exists only for the duration of one fan-out call and
/// is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A client completed its handshake
    Joined { addr: String },
    /// A client's transport closed
    Left { addr: String },
    /// An inbound message, tagged with the sender's remote address
    Message { addr: String, text: String },
}

impl Notice {
    pub fn joined(addr: impl Into<String>) -> Self {
        Notice::Joined { addr: addr.into() }
    }

    pub fn left(addr: impl Into<String>) -> Self {
        Notice::Left { addr: addr.into() }
    }

    pub fn message(addr: impl Into<String>, text: impl Into<String>) -> Self {
        Notice::Message {
            addr: addr.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Joined { addr } => {
                write!(f, "A new client has joined the chat: {}", addr)
            }
            Notice::Left { addr } => {
                write!(f, "A client has left the chat: {}", addr)
            }
            Notice::Message { addr, text } => write!(f, "[{}] {}", addr, text),
        }
    }
}

// ----------------------------------------------------------------------------
// Client Payload Helpers
// ----------------------------------------------------------------------------

/// First payload a client sends after its handshake completes
pub fn announcement(alias: &str) -> String {
    format!("{} has connected.", alias)
}

/// An ordinary chat line, signed with the sender's alias
pub fn signed_line(alias: &str, text: &str) -> String {
    format!("{}: {}", alias, text)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
