//! TCP dialer.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use super::{BoxedStream, Connect, ConnectFuture};

/// Default time allowed for a TCP connect before it counts as failed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials publishers over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    nodelay: bool,
}

impl TcpConnector {
    /// Create a connector with the default timeout and `TCP_NODELAY` on.
    pub fn new() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            nodelay: true,
        }
    }

    /// Set the connect timeout (`None` waits for the OS to give up).
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY` on new streams.
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    async fn dial(
        endpoint: SocketAddr,
        timeout: Option<Duration>,
        nodelay: bool,
    ) -> io::Result<TcpStream> {
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(endpoint))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {} timed out after {:?}", endpoint, limit),
                    )
                })??,
            None => TcpStream::connect(endpoint).await?,
        };
        stream.set_nodelay(nodelay)?;
        Ok(stream)
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for TcpConnector {
    fn connect(&self, endpoint: SocketAddr) -> ConnectFuture {
        let timeout = self.connect_timeout;
        let nodelay = self.nodelay;
        Box::pin(async move {
            let stream = Self::dial(endpoint, timeout, nodelay).await?;
            tracing::debug!("Connected to {}", endpoint);
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}
