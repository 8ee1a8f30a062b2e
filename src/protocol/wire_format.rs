//! Wire format encoding and decoding.
//!
//! Every message on a subscription socket starts with the same 8-byte header:
//! ```text
//! ┌──────────┬─────────────┐
//! │ Length   │ Result code │
//! │ 4 bytes  │ 4 bytes     │
//! │ uint32 BE│ uint32 BE   │
//! └──────────┴─────────────┘
//! ```
//!
//! `length` counts the body bytes that follow the header. Requests leave the
//! result code at zero; replies use it to carry [`ResultCode`].
//!
//! All multi-byte integers are Big Endian, no padding.

use crate::error::{Result, SubwireError};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Default maximum body size accepted from a publisher (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Procedure name sent at the start of every subscribe request.
pub const SUBSCRIBE_PROCEDURE: &str = "sub_topic";

/// Outcome carried by a reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultCode {
    /// The request was accepted.
    Ok = 0,
    /// The request was rejected; the body (if any) holds a serialized exception.
    Fail = 1,
}

impl ResultCode {
    /// Wire representation of this code.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl From<u32> for ResultCode {
    /// Zero is `Ok`; every other value is treated as a failure.
    fn from(raw: u32) -> Self {
        if raw == 0 {
            ResultCode::Ok
        } else {
            ResultCode::Fail
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireHeader {
    /// Body length in bytes.
    pub length: u32,
    /// Raw result code (0 = OK).
    pub result_code: u32,
}

impl WireHeader {
    /// Create a new header.
    pub fn new(length: u32, result_code: u32) -> Self {
        Self {
            length,
            result_code,
        }
    }

    /// Header for an outgoing request carrying `length` body bytes.
    pub fn request(length: u32) -> Self {
        Self::new(length, ResultCode::Ok.as_u32())
    }

    /// Zero-length header used as a heartbeat ping (and echoed back as its ack).
    pub fn heartbeat() -> Self {
        Self::default()
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use subwire_client::protocol::WireHeader;
    ///
    /// let bytes = WireHeader::new(37, 0).encode();
    /// assert_eq!(bytes, [0, 0, 0, 37, 0, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.length.to_be_bytes());
        buf[4..8].copy_from_slice(&self.result_code.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use subwire_client::protocol::{ResultCode, WireHeader};
    ///
    /// let header = WireHeader::decode(&[0, 0, 0, 12, 0, 0, 0, 1]).unwrap();
    /// assert_eq!(header.length, 12);
    /// assert_eq!(header.result(), ResultCode::Fail);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            length: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            result_code: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Reject headers announcing a body larger than `max_payload_size`.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.length > max_payload_size {
            return Err(SubwireError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.length, max_payload_size
            )));
        }
        Ok(())
    }

    /// Interpreted result code.
    #[inline]
    pub fn result(&self) -> ResultCode {
        ResultCode::from(self.result_code)
    }

    /// Check if the reply carries `ResultCode::Ok`.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result() == ResultCode::Ok
    }

    /// A zero-length frame: a ping when sent, a heartbeat ack when received.
    #[inline]
    pub fn is_heartbeat(&self) -> bool {
        self.length == 0
    }
}
