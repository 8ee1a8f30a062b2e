//! Heartbeat loop.
//!
//! Runs beside the receive loop once a session is active. It owns the write
//! half of the stream and never reads; the publisher's zero-length acks are
//! consumed by the receive loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;

use super::machine::{Interrupt, SubscriptionSession};
use crate::protocol::write_heartbeat;

/// Ping the publisher every `interval` until the session stops or a write fails.
pub(super) async fn run<W>(session: Arc<SubscriptionSession>, mut writer: W, interval: Duration)
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = session.connection().closed() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        if !session.is_live() {
            return;
        }

        match session.step(write_heartbeat(&mut writer)).await {
            Ok(()) => tracing::trace!("Heartbeat sent on {}", session.topic()),
            Err(Interrupt::Stopped) => return,
            Err(Interrupt::Failed(error)) => {
                session.fail(error);
                return;
            }
        }
    }
}
