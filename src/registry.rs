//! Subscription registry and its builder.
//!
//! The [`SubscriptionRegistry`] keeps at most one live session per
//! (endpoint, topic) pair. It creates and starts sessions on
//! [`subscribe`](SubscriptionRegistry::subscribe) and forgets them when they
//! fail. Sessions report back through [`SessionSupervisor`], held weakly, so
//! a registry and the sessions it created never keep each other alive.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use subwire_client::{SubscriptionRegistry, Topic};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SubscriptionRegistry::builder()
//!         .heartbeat_interval(Duration::from_secs(15))
//!         .build();
//!
//!     let topic: Topic<&str, f64> = Topic::new("prices", "ACME");
//!     registry.subscribe_with_error(
//!         "127.0.0.1:9000".parse()?,
//!         topic,
//!         |price| println!("ACME: {}", price),
//!         |err| eprintln!("subscription failed: {}", err),
//!     )?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     registry.shutdown();
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::codec::{Codec, MsgPackCodec};
use crate::config::SubscriberConfig;
use crate::error::{Result, SubwireError};
use crate::protocol::SubscribeRequest;
use crate::session::{
    ErrorCallback, MessageCallback, ProtocolException, SessionSupervisor, SubscriptionError,
    SubscriptionSession,
};
use crate::topic::TopicDescriptor;
use crate::transport::{Connect, Connection, TcpConnector};

/// Sessions of one endpoint, by topic name.
type TopicMap = HashMap<String, Arc<SubscriptionSession>>;

/// All sessions, by endpoint.
type EndpointMap = HashMap<SocketAddr, TopicMap>;

/// Builder for configuring and creating a [`SubscriptionRegistry`].
pub struct RegistryBuilder<C = MsgPackCodec> {
    codec: C,
    config: SubscriberConfig,
    tcp: TcpConnector,
    connector: Option<Arc<dyn Connect>>,
}

impl RegistryBuilder<MsgPackCodec> {
    /// Create a builder using MsgPack and TCP.
    pub fn new() -> Self {
        Self {
            codec: MsgPackCodec,
            config: SubscriberConfig::default(),
            tcp: TcpConnector::new(),
            connector: None,
        }
    }
}

impl Default for RegistryBuilder<MsgPackCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> RegistryBuilder<C> {
    /// Use `codec` for topics, messages and publisher exceptions.
    pub fn codec<D: Codec>(self, codec: D) -> RegistryBuilder<D> {
        RegistryBuilder {
            codec,
            config: self.config,
            tcp: self.tcp,
            connector: self.connector,
        }
    }

    /// Set the interval between heartbeat pings.
    ///
    /// Default: 15 seconds
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the largest message body accepted from a publisher.
    ///
    /// Default: 64 MiB
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.config.max_payload_size = limit;
        self
    }

    /// Set the procedure name sent in the subscribe handshake.
    ///
    /// Default: `"sub_topic"`
    pub fn procedure_name(mut self, name: impl Into<String>) -> Self {
        self.config.procedure_name = name.into();
        self
    }

    /// Set the TCP connect timeout (`None` to wait indefinitely).
    ///
    /// Default: 10 seconds. Ignored when a custom connector is installed.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tcp = self.tcp.connect_timeout(timeout);
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    ///
    /// Default: enabled. Ignored when a custom connector is installed.
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.tcp = self.tcp.nodelay(nodelay);
        self
    }

    /// Replace the TCP dialer, e.g. with TLS or an in-memory transport.
    pub fn connector(mut self, connector: impl Connect) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Build the registry.
    pub fn build(self) -> SubscriptionRegistry<C> {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(self.tcp) as Arc<dyn Connect>);

        SubscriptionRegistry {
            shared: Arc::new(Shared {
                codec: Arc::new(self.codec),
                config: Arc::new(self.config),
                connector,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// State shared between the registry handle and its sessions' supervisor.
struct Shared<C> {
    codec: Arc<C>,
    config: Arc<SubscriberConfig>,
    connector: Arc<dyn Connect>,
    sessions: Mutex<EndpointMap>,
}

impl<C: Codec> Shared<C> {
    fn remove(&self, session: &Arc<SubscriptionSession>) -> bool {
        let endpoint = session.endpoint();
        let mut sessions = self.sessions.lock();

        let Some(topics) = sessions.get_mut(&endpoint) else {
            return false;
        };

        // Only the registered instance; a newer session under the same key stays.
        let removed = match topics.get(session.topic()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                topics.remove(session.topic());
                true
            }
            _ => false,
        };

        if topics.is_empty() {
            sessions.remove(&endpoint);
        }

        if removed {
            tracing::debug!("Removed subscription {} on {}", session.topic(), endpoint);
        }
        removed
    }
}

impl<C: Codec> SessionSupervisor for Shared<C> {
    fn session_failed(&self, session: &Arc<SubscriptionSession>) {
        self.remove(session);
    }

    fn decode_exception(&self, bytes: &[u8]) -> Result<ProtocolException> {
        self.codec.unpack(bytes)
    }
}

/// Keyed store of live subscriptions.
///
/// Dropping the registry stops every session it still holds.
pub struct SubscriptionRegistry<C: Codec = MsgPackCodec> {
    shared: Arc<Shared<C>>,
}

impl SubscriptionRegistry<MsgPackCodec> {
    /// Create a registry with default configuration (MsgPack over TCP).
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    /// Create a registry builder.
    pub fn builder() -> RegistryBuilder<MsgPackCodec> {
        RegistryBuilder::new()
    }
}

impl Default for SubscriptionRegistry<MsgPackCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> SubscriptionRegistry<C> {
    /// Subscribe to `topic` on `endpoint`.
    ///
    /// Message bodies are decoded through the topic descriptor before reaching
    /// `on_message`; bodies that fail to decode are logged and skipped.
    /// Session failures are not reported to the caller, but still remove the
    /// session. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`SubwireError::AlreadySubscribed`] if the pair is already registered
    /// - codec or protocol errors while building the handshake request
    /// - [`SubwireError::NoRuntime`] outside a Tokio runtime
    pub fn subscribe<T, F>(
        &self,
        endpoint: SocketAddr,
        topic: T,
        on_message: F,
    ) -> Result<Arc<SubscriptionSession>>
    where
        T: TopicDescriptor,
        F: Fn(T::Message) + Send + Sync + 'static,
    {
        self.subscribe_inner(endpoint, topic, on_message, None)
    }

    /// Like [`subscribe`](Self::subscribe), additionally reporting the
    /// session's terminal error to `on_error`.
    pub fn subscribe_with_error<T, F, E>(
        &self,
        endpoint: SocketAddr,
        topic: T,
        on_message: F,
        on_error: E,
    ) -> Result<Arc<SubscriptionSession>>
    where
        T: TopicDescriptor,
        F: Fn(T::Message) + Send + Sync + 'static,
        E: Fn(&SubscriptionError) + Send + Sync + 'static,
    {
        self.subscribe_inner(endpoint, topic, on_message, Some(Box::new(on_error)))
    }

    fn subscribe_inner<T, F>(
        &self,
        endpoint: SocketAddr,
        topic: T,
        on_message: F,
        on_error: Option<ErrorCallback>,
    ) -> Result<Arc<SubscriptionSession>>
    where
        T: TopicDescriptor,
        F: Fn(T::Message) + Send + Sync + 'static,
    {
        let name = topic.name().to_string();
        let payload = topic.pack_topic(self.shared.codec.as_ref())?;
        let request =
            SubscribeRequest::new(&self.shared.config.procedure_name, Bytes::from(payload))?;
        let on_message = self.typed_callback(topic, on_message);

        let mut sessions = self.shared.sessions.lock();

        if sessions
            .get(&endpoint)
            .map_or(false, |topics| topics.contains_key(&name))
        {
            return Err(SubwireError::AlreadySubscribed {
                endpoint,
                topic: name,
            });
        }

        let shared = Arc::downgrade(&self.shared);
        let supervisor: Weak<dyn SessionSupervisor> = shared;
        let session = SubscriptionSession::new(
            Connection::new(endpoint, self.shared.connector.clone()),
            name.clone(),
            request,
            on_message,
            on_error,
            self.shared.config.clone(),
            supervisor,
        );
        session.start()?;

        sessions
            .entry(endpoint)
            .or_default()
            .insert(name.clone(), session.clone());

        tracing::info!("Subscribed to {} on {}", name, endpoint);
        Ok(session)
    }

    /// Wrap a typed callback so it receives decoded messages.
    fn typed_callback<T, F>(&self, topic: T, on_message: F) -> MessageCallback
    where
        T: TopicDescriptor,
        F: Fn(T::Message) + Send + Sync + 'static,
    {
        let codec = self.shared.codec.clone();
        Box::new(move |body: Bytes| match topic.unpack(codec.as_ref(), &body) {
            Ok(message) => on_message(message),
            Err(e) => tracing::warn!(
                "Dropping undecodable message on topic {}: {}",
                topic.name(),
                e
            ),
        })
    }

    /// Forget `session` if it is the one registered under its key.
    ///
    /// Removing a session that is not registered is a no-op. An endpoint with
    /// no topics left is dropped entirely. Returns whether an entry was removed.
    pub fn remove(&self, session: &Arc<SubscriptionSession>) -> bool {
        self.shared.remove(session)
    }

    /// Stop and forget the subscription to `topic` on `endpoint`.
    ///
    /// Returns `false` if there was none.
    pub fn unsubscribe(&self, endpoint: SocketAddr, topic: &str) -> bool {
        let session = {
            let mut sessions = self.shared.sessions.lock();
            let Some(topics) = sessions.get_mut(&endpoint) else {
                return false;
            };
            let session = topics.remove(topic);
            if topics.is_empty() {
                sessions.remove(&endpoint);
            }
            session
        };

        match session {
            Some(session) => {
                session.stop();
                tracing::info!("Unsubscribed from {} on {}", topic, endpoint);
                true
            }
            None => false,
        }
    }

    /// Session registered for (`endpoint`, `topic`), if any.
    pub fn get(&self, endpoint: SocketAddr, topic: &str) -> Option<Arc<SubscriptionSession>> {
        self.shared
            .sessions
            .lock()
            .get(&endpoint)
            .and_then(|topics| topics.get(topic))
            .cloned()
    }

    /// Whether a session is registered for (`endpoint`, `topic`).
    pub fn contains(&self, endpoint: SocketAddr, topic: &str) -> bool {
        self.get(endpoint, topic).is_some()
    }

    /// Number of registered sessions across all endpoints.
    pub fn len(&self) -> usize {
        self.shared.sessions.lock().values().map(HashMap::len).sum()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.shared.sessions.lock().is_empty()
    }

    /// Endpoints with at least one registered session, sorted.
    pub fn endpoints(&self) -> Vec<SocketAddr> {
        let mut endpoints: Vec<_> = self.shared.sessions.lock().keys().copied().collect();
        endpoints.sort();
        endpoints
    }

    /// Topics registered on `endpoint`, sorted.
    pub fn topics(&self, endpoint: SocketAddr) -> Vec<String> {
        let mut topics: Vec<_> = self
            .shared
            .sessions
            .lock()
            .get(&endpoint)
            .map(|topics| topics.keys().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Configuration shared by this registry's sessions.
    pub fn config(&self) -> &SubscriberConfig {
        &self.shared.config
    }

    /// Stop every session and clear the registry.
    pub fn shutdown(&self) {
        let sessions = std::mem::take(&mut *self.shared.sessions.lock());
        let count: usize = sessions.values().map(HashMap::len).sum();

        for session in sessions.into_values().flat_map(HashMap::into_values) {
            session.stop();
        }

        if count > 0 {
            tracing::info!("Stopped {} subscription(s)", count);
        }
    }
}

impl<C: Codec> Drop for SubscriptionRegistry<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<C: Codec> fmt::Debug for SubscriptionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("endpoints", &self.endpoints())
            .field("sessions", &self.len())
            .finish()
    }
}
