//! Session module - one subscription's state machine and its error taxonomy.
//!
//! Provides:
//! - [`SubscriptionSession`] - handshake, receive loop and heartbeat loop over one stream
//! - [`SubscriptionError`] / [`ProtocolException`] - what a failed session reports
//! - [`SessionSupervisor`] - capability through which a session reports failure
//!   and decodes publisher exceptions

mod exception;
mod heartbeat;
mod machine;
mod supervisor;

pub use exception::{kinds, ErrorKind, ProtocolException, SubscriptionError};
pub use machine::{ErrorCallback, MessageCallback, SessionState, SubscriptionSession};
pub use supervisor::SessionSupervisor;
