//! Topic descriptors.
//!
//! A [`TopicDescriptor`] names a message stream, serializes the payload that
//! identifies it in the subscribe handshake, and decodes the messages that
//! arrive on it. [`Topic`] covers the common case of a serde key paired with
//! a serde message type.
//!
//! # Example
//!
//! ```
//! use subwire_client::codec::MsgPackCodec;
//! use subwire_client::topic::{Topic, TopicDescriptor};
//!
//! let topic: Topic<&str, u64> = Topic::new("prices", "ACME");
//! assert_eq!(topic.name(), "prices");
//!
//! let payload = topic.pack_topic(&MsgPackCodec).unwrap();
//! assert!(!payload.is_empty());
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::Result;

/// Description of a subscribable topic.
pub trait TopicDescriptor: Send + Sync + 'static {
    /// Decoded message type delivered to subscribers.
    type Message: Send + 'static;

    /// Topic name; together with the endpoint it identifies a subscription.
    fn name(&self) -> &str;

    /// Serialize the topic payload sent in the subscribe handshake.
    fn pack_topic<C: Codec>(&self, codec: &C) -> Result<Vec<u8>>;

    /// Decode one message body received on this topic.
    fn unpack<C: Codec>(&self, codec: &C, bytes: &[u8]) -> Result<Self::Message>;
}

/// Topic identified by a serializable key, carrying messages of type `M`.
pub struct Topic<K, M> {
    name: String,
    key: K,
    _message: PhantomData<fn() -> M>,
}

impl<K, M> Topic<K, M> {
    /// Create a topic called `name` whose handshake payload is `key`.
    pub fn new(name: impl Into<String>, key: K) -> Self {
        Self {
            name: name.into(),
            key,
            _message: PhantomData,
        }
    }

    /// The key sent in the handshake.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Clone, M> Clone for Topic<K, M> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.key.clone())
    }
}

impl<K: fmt::Debug, M> fmt::Debug for Topic<K, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

impl<K, M> TopicDescriptor for Topic<K, M>
where
    K: Serialize + Send + Sync + 'static,
    M: DeserializeOwned + Send + 'static,
{
    type Message = M;

    fn name(&self) -> &str {
        &self.name
    }

    fn pack_topic<C: Codec>(&self, codec: &C) -> Result<Vec<u8>> {
        codec.pack(&self.key)
    }

    fn unpack<C: Codec>(&self, codec: &C, bytes: &[u8]) -> Result<M> {
        codec.unpack(bytes)
    }
}
