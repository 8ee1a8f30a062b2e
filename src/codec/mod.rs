//! Codec module - serialization of topics, messages and exceptions.
//!
//! A [`Codec`] turns serde values into bytes and back. The registry uses one
//! codec for everything it sends or receives:
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`), the default
//! - [`JsonCodec`] - JSON using `serde_json`, handy for debugging publishers
//!
//! # Example
//!
//! ```
//! use subwire_client::codec::{Codec, JsonCodec, MsgPackCodec};
//!
//! let encoded = MsgPackCodec.pack(&"hello").unwrap();
//! let decoded: String = MsgPackCodec.unpack(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let json = JsonCodec.pack(&[1, 2, 3]).unwrap();
//! assert_eq!(json, b"[1,2,3]");
//! ```

mod json;
mod msgpack;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

/// Encoding scheme shared by a registry and every session it creates.
pub trait Codec: Send + Sync + 'static {
    /// Encode a value to bytes.
    fn pack<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes to a value.
    fn unpack<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}
