//! Subscriber configuration.
//!
//! [`SubscriberConfig`] is shared by every session a registry creates. Set it
//! through the fluent methods on
//! [`RegistryBuilder`](crate::registry::RegistryBuilder).

use std::time::Duration;

use crate::protocol::{DEFAULT_MAX_PAYLOAD_SIZE, SUBSCRIBE_PROCEDURE};

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Configuration applied to every subscription session.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Time between heartbeat pings once a subscription is active.
    pub heartbeat_interval: Duration,
    /// Largest message body accepted from a publisher.
    pub max_payload_size: u32,
    /// Procedure name sent at the start of the subscribe handshake.
    pub procedure_name: String,
}

impl Default for SubscriberConfig {
    /// - `heartbeat_interval`: 15s
    /// - `max_payload_size`: 64 MiB
    /// - `procedure_name`: `"sub_topic"`
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            procedure_name: SUBSCRIBE_PROCEDURE.to_string(),
        }
    }
}
