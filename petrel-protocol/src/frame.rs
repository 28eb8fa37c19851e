//! Binary frame format for PCP.
//!
//! Frame layout (two length fields + header + payload):
//!
//! ```text
//! +--------------+--------------+--------------+---------------+
//! | total_length | header_length| header_bytes | payload_bytes |
//! |   4 bytes    |   4 bytes    |  header_len  |   remainder   |
//! +--------------+--------------+--------------+---------------+
//! ```
//!
//! `total_length` excludes its own 4 bytes, so
//! `total_length = 4 + header_len + payload_len`. All integers big-endian.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the total-length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the header-length field in bytes.
pub const HEADER_LENGTH_SIZE: usize = 4;

/// A parsed PCP frame: command header bytes plus message payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Serialized command header (JSON).
    pub header: Bytes,
    /// Message payload (schema-encoded bytes; empty for pure control frames).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame from header and payload bytes.
    pub fn new(header: Bytes, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Creates a control frame carrying only a command header.
    pub fn control(header: Bytes) -> Self {
        Self {
            header,
            payload: Bytes::new(),
        }
    }

    /// Total frame length as declared on the wire (excludes the prefix itself).
    pub fn total_length(&self) -> usize {
        HEADER_LENGTH_SIZE + self.header.len() + self.payload.len()
    }

    /// Encodes the frame into bytes.
    ///
    /// Fails with [`ProtocolError::FrameTooLarge`] if the declared length
    /// would exceed `max_frame_size`.
    pub fn encode(&self, max_frame_size: u32) -> Result<BytesMut, ProtocolError> {
        let total = self.total_length();
        if total > max_frame_size as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: total,
                max: max_frame_size,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + total);
        buf.put_u32(total as u32);
        buf.put_u32(self.header.len() as u32);
        buf.put_slice(&self.header);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    ///
    /// A frame whose declared length exceeds `max_frame_size` is rejected
    /// as soon as the length prefix is readable, without waiting for the
    /// rest of its bytes.
    pub fn decode(buf: &mut BytesMut, max_frame_size: u32) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek at the length prefix without consuming
        let total = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if total > max_frame_size as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: total,
                max: max_frame_size,
            });
        }
        if total < HEADER_LENGTH_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared length {} shorter than the header-length field",
                total
            )));
        }

        if buf.len() < LENGTH_PREFIX_SIZE + total {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let header_len = buf.get_u32() as usize;
        if header_len > total - HEADER_LENGTH_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "header length {} exceeds frame length {}",
                header_len, total
            )));
        }

        let header = buf.split_to(header_len).freeze();
        let payload = buf.split_to(total - HEADER_LENGTH_SIZE - header_len).freeze();

        Ok(Some(Self { header, payload }))
    }
}
