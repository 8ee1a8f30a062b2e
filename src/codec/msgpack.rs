//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always written with `to_vec_named`, i.e. as maps keyed by
//! field name. Publishers written in dynamic languages decode maps directly,
//! and a rejection such as `{kind: "Denied", message: "topic unknown"}` stays
//! readable regardless of field order.
//!
//! # Example
//!
//! ```
//! use subwire_client::codec::{Codec, MsgPackCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Tick {
//!     symbol: String,
//!     price: u64,
//! }
//!
//! let tick = Tick { symbol: "ACME".to_string(), price: 1250 };
//! let encoded = MsgPackCodec.pack(&tick).unwrap();
//! let decoded: Tick = MsgPackCodec.unpack(&encoded).unwrap();
//! assert_eq!(decoded, tick);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;

/// MessagePack codec for structured data (struct-as-map encoding).
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes without going through the trait.
    #[inline]
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value without going through the trait.
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl Codec for MsgPackCodec {
    #[inline]
    fn pack<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        Self::encode(value)
    }

    #[inline]
    fn unpack<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Self::decode(bytes)
    }
}
