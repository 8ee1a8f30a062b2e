//! Per-session transport handle.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::{BoxedStream, Connect};

/// One session's connection to its publisher.
///
/// The stream itself is owned by the session's tasks once dialed; this handle
/// keeps the endpoint and the single close signal those tasks race against.
pub struct Connection {
    endpoint: SocketAddr,
    connector: Arc<dyn Connect>,
    closed: CancellationToken,
}

impl Connection {
    /// Create an unopened connection to `endpoint`.
    pub fn new(endpoint: SocketAddr, connector: Arc<dyn Connect>) -> Self {
        Self {
            endpoint,
            connector,
            closed: CancellationToken::new(),
        }
    }

    /// Publisher address.
    #[inline]
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Dial the publisher.
    ///
    /// Fails with `ConnectionAborted` if the connection is closed before or
    /// while dialing.
    pub async fn open(&self) -> io::Result<BoxedStream> {
        if !self.is_open() {
            return Err(closed_error());
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            result = self.connector.connect(self.endpoint) => result,
        }
    }

    /// Whether [`close`](Self::close) has not been called yet.
    #[inline]
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Close the connection. Outstanding I/O racing [`closed`](Self::closed)
    /// is abandoned and the stream halves are dropped by their owners.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectFuture;
    use std::future;

    /// Dialer that never completes.
    struct Hang;

    impl Connect for Hang {
        fn connect(&self, _endpoint: SocketAddr) -> ConnectFuture {
            Box::pin(future::pending())
        }
    }

    /// Dialer that hands out one side of an in-memory pipe.
    struct Duplex;

    impl Connect for Duplex {
        fn connect(&self, _endpoint: SocketAddr) -> ConnectFuture {
            let (client, _server) = tokio::io::duplex(64);
            Box::pin(async move { Ok(Box::new(client) as BoxedStream) })
        }
    }

    fn endpoint() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_open_uses_connector() {
        let connection = Connection::new(endpoint(), Arc::new(Duplex));
        assert!(connection.is_open());
        assert!(connection.open().await.is_ok());
        assert_eq!(connection.endpoint(), endpoint());
    }

    #[tokio::test]
    async fn test_close_aborts_pending_dial() {
        let connection = Arc::new(Connection::new(endpoint(), Arc::new(Hang)));

        let dialer = connection.clone();
        let pending = tokio::spawn(async move { dialer.open().await.map(|_| ()) });

        tokio::task::yield_now().await;
        connection.close();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_open_after_close_fails() {
        let connection = Connection::new(endpoint(), Arc::new(Duplex));
        connection.close();
        assert!(connection.open().await.is_err());
        assert!(format!("{:?}", connection).contains("open: false"));
    }
}
