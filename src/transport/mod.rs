//! Transport module - how sessions reach a publisher.
//!
//! Provides:
//! - [`Connect`] - pluggable dialer producing a byte stream for an endpoint
//! - [`TcpConnector`] - the default dialer (Tokio TCP, optional connect timeout)
//! - [`Connection`] - one session's view of its transport: dial once, close once

mod connection;
mod tcp;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

pub use connection::Connection;
pub use tcp::TcpConnector;

/// Byte stream usable by a session: readable and writable from different tasks.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased stream handed out by a [`Connect`] implementation.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Future returned by [`Connect::connect`].
pub type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<BoxedStream>> + Send>>;

/// Dialer used by sessions to open their transport.
pub trait Connect: Send + Sync + 'static {
    /// Open a fresh stream to `endpoint`.
    fn connect(&self, endpoint: SocketAddr) -> ConnectFuture;
}
