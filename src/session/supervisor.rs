//! Capability a session uses to report back to whoever created it.

use std::sync::Arc;

use super::exception::ProtocolException;
use super::machine::SubscriptionSession;
use crate::error::Result;

/// Owner of a set of sessions.
///
/// Each session holds its supervisor weakly and calls into it from its own
/// tasks, so implementations must not block.
pub trait SessionSupervisor: Send + Sync + 'static {
    /// The session hit a terminal error and has stopped.
    fn session_failed(&self, session: &Arc<SubscriptionSession>);

    /// Decode the exception carried by a rejected handshake.
    fn decode_exception(&self, bytes: &[u8]) -> Result<ProtocolException>;
}
