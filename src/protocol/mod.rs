//! Protocol module - wire header and subscription frames.
//!
//! This module implements the binary framing used on subscription sockets:
//! - 8-byte header encoding/decoding
//! - Subscribe request built for a single scatter/gather write
//! - Async helpers reading a header and its body, and writing heartbeats

mod frame;
mod wire_format;

pub use frame::{read_body, read_header, write_heartbeat, SubscribeRequest};
pub use wire_format::{
    ResultCode, WireHeader, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, SUBSCRIBE_PROCEDURE,
};
