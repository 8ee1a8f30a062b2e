//! Subscription frames and the async helpers that move them over a stream.
//!
//! A subscribe request is written as three slices in one vectored write:
//! ```text
//! [ WireHeader ][ procedure name \0 ][ topic payload ]
//! ```
//! Replies and steady-state messages are read as a header followed by exactly
//! `length` body bytes.
//!
//! # Example
//!
//! ```
//! use subwire_client::protocol::{SubscribeRequest, HEADER_SIZE};
//! use bytes::Bytes;
//!
//! let request = SubscribeRequest::new("sub_topic", Bytes::from_static(b"prices")).unwrap();
//! let wire = request.to_vec();
//! assert_eq!(request.header().length as usize, "sub_topic".len() + 1 + 6);
//! assert_eq!(wire.len(), HEADER_SIZE + request.header().length as usize);
//! assert_eq!(wire[HEADER_SIZE + 9], 0);
//! ```

use std::io::{self, IoSlice};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::{WireHeader, HEADER_SIZE};
use crate::error::{Result, SubwireError};

/// Handshake request registering interest in one topic.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    /// Request header (`length` = body size).
    header: WireHeader,
    /// Procedure name including the trailing NUL.
    procedure: Bytes,
    /// Serialized topic descriptor.
    topic: Bytes,
}

impl SubscribeRequest {
    /// Build a request for `procedure` carrying the serialized `topic`.
    ///
    /// Fails if the procedure name contains a NUL byte or the body would not
    /// fit in a `u32` length.
    pub fn new(procedure: &str, topic: Bytes) -> Result<Self> {
        if procedure.as_bytes().contains(&0) {
            return Err(SubwireError::Protocol(
                "Procedure name must not contain NUL".to_string(),
            ));
        }

        let mut name = BytesMut::with_capacity(procedure.len() + 1);
        name.extend_from_slice(procedure.as_bytes());
        name.extend_from_slice(&[0]);

        let length = u32::try_from(name.len() + topic.len()).map_err(|_| {
            SubwireError::Protocol(format!(
                "Subscribe request body of {} bytes does not fit the header",
                name.len() + topic.len()
            ))
        })?;

        Ok(Self {
            header: WireHeader::request(length),
            procedure: name.freeze(),
            topic,
        })
    }

    /// Decoded header of this request.
    pub fn header(&self) -> WireHeader {
        self.header
    }

    /// Total size of this request (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.procedure.len() + self.topic.len()
    }

    /// Contiguous copy of the request, as it appears on the wire.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.procedure);
        buf.extend_from_slice(&self.topic);
        buf
    }

    /// Write the request as a single scatter/gather write.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let header = self.header.encode();
        write_parts(writer, &[&header[..], &self.procedure[..], &self.topic[..]]).await
    }
}

/// Write a zero-length heartbeat ping.
pub async fn write_heartbeat<W>(writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&WireHeader::heartbeat().encode()).await?;
    writer.flush().await
}

/// Read exactly one header.
pub async fn read_header<R>(reader: &mut R) -> io::Result<WireHeader>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut buf).await?;
    Ok(WireHeader::decode(&buf).unwrap_or_default())
}

/// Read exactly `length` body bytes.
pub async fn read_body<R>(reader: &mut R, length: u32) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(length as usize);
    reader.read_exact(&mut buf).await?;
    Ok(buf.freeze())
}

/// Write all `parts` using `write_vectored`, resuming after partial writes.
async fn write_parts<W>(writer: &mut W, parts: &[&[u8]]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = parts.iter().map(|p| p.len()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(parts, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }
        total_written += written;
    }

    writer.flush().await
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn remaining_slices<'a>(parts: &[&'a [u8]], skip_bytes: usize) -> Vec<IoSlice<'a>> {
    let mut slices = Vec::with_capacity(parts.len());
    let mut start = 0;

    for part in parts {
        let end = start + part.len();
        if skip_bytes < end && !part.is_empty() {
            slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(start)..]));
        }
        start = end;
    }

    slices
}
