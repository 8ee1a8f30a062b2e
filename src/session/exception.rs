//! Errors reported by running subscriptions.
//!
//! A publisher rejects a subscription by replying with a non-OK result code
//! and a serialized [`ProtocolException`]. Everything a session reports to
//! its error callback is a [`SubscriptionError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exception kinds produced on the client side.
pub mod kinds {
    /// Rejection body that could not be decoded.
    pub const UNKNOWN: &str = "Unknown";
}

/// Exception as exchanged with publishers: a kind plus a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ProtocolException {
    /// Machine-readable kind, e.g. `"Denied"`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl ProtocolException {
    /// Create an exception.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Category of a [`SubscriptionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect, read or write failed.
    BadConnection,
    /// The publisher answered the handshake with a failure.
    ServerRejected,
    /// The handshake reply carried a failure code but no exception body.
    MalformedHandshakeReply,
    /// A frame exceeded the configured maximum body size.
    OversizedFrame,
}

/// Failure of a running subscription, delivered to its error callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Transport-level failure; carries the underlying system error text.
    #[error("Bad connection: {0}")]
    BadConnection(String),

    /// The publisher rejected the subscription.
    #[error("Subscription rejected: {0}")]
    ServerRejected(ProtocolException),

    /// Handshake reply with a failure code and `length == 0`.
    #[error("Malformed handshake reply: result code {result_code} without a body")]
    MalformedHandshakeReply {
        /// Raw result code from the reply header.
        result_code: u32,
    },

    /// A header announced more body bytes than allowed.
    #[error("Frame of {length} bytes exceeds maximum {max}")]
    OversizedFrame {
        /// Announced body length.
        length: u32,
        /// Configured limit.
        max: u32,
    },
}

impl SubscriptionError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubscriptionError::BadConnection(_) => ErrorKind::BadConnection,
            SubscriptionError::ServerRejected(_) => ErrorKind::ServerRejected,
            SubscriptionError::MalformedHandshakeReply { .. } => ErrorKind::MalformedHandshakeReply,
            SubscriptionError::OversizedFrame { .. } => ErrorKind::OversizedFrame,
        }
    }

    /// The publisher's exception, if this is a rejection.
    pub fn rejection(&self) -> Option<&ProtocolException> {
        match self {
            SubscriptionError::ServerRejected(exception) => Some(exception),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SubscriptionError {
    fn from(err: std::io::Error) -> Self {
        SubscriptionError::BadConnection(err.to_string())
    }
}
