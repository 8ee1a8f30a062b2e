//! Error types for subwire-client.
//!
//! [`SubwireError`] covers failures returned synchronously from the API.
//! Failures of a running subscription are reported asynchronously as
//! [`SubscriptionError`](crate::session::SubscriptionError) instead.

use std::net::SocketAddr;

use thiserror::Error;

/// Main error type for synchronous subwire operations.
#[derive(Debug, Error)]
pub enum SubwireError {
    /// A session for this (endpoint, topic) pair is already registered.
    #[error("Already subscribed to topic {topic} on {endpoint}")]
    AlreadySubscribed {
        /// Publisher address.
        endpoint: SocketAddr,
        /// Topic name.
        topic: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (oversized frame, invalid procedure name, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `subscribe` was called outside of a Tokio runtime.
    #[error("No Tokio runtime available to drive the subscription")]
    NoRuntime,
}

/// Result type alias using SubwireError.
pub type Result<T> = std::result::Result<T, SubwireError>;
