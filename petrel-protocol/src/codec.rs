//! Encoder and decoder for PCP frames and commands.

use crate::command::CommandHeader;
use crate::error::ProtocolError;
use crate::frame::Frame;
use bytes::{Bytes, BytesMut};

/// Encodes commands into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a command header with an attached message payload.
    pub fn encode_command(
        header: &CommandHeader,
        payload: Bytes,
        max_frame_size: u32,
    ) -> Result<BytesMut, ProtocolError> {
        let header_bytes = serde_json::to_vec(header)?;
        Frame::new(Bytes::from(header_bytes), payload).encode(max_frame_size)
    }

    /// Encodes a payload-less control command.
    pub fn encode_control(
        header: &CommandHeader,
        max_frame_size: u32,
    ) -> Result<BytesMut, ProtocolError> {
        Self::encode_command(header, Bytes::new(), max_frame_size)
    }
}

/// Decodes byte streams into frames and commands.
///
/// Accumulates socket reads in an internal buffer; frames are extracted as
/// they complete, one at a time.
pub struct Decoder {
    buffer: BytesMut,
    max_frame_size: u32,
}

impl Decoder {
    pub fn new(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Updates the maximum decodable frame size (after CONNECTED
    /// negotiation).
    pub fn set_max_frame_size(&mut self, max_frame_size: u32) {
        self.max_frame_size = max_frame_size;
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer, self.max_frame_size)
    }

    /// Attempts to decode the next command (header + payload) from the
    /// buffer.
    pub fn decode_command(&mut self) -> Result<Option<(CommandHeader, Bytes)>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => {
                let header_str =
                    std::str::from_utf8(&frame.header).map_err(|_| ProtocolError::InvalidUtf8)?;
                let header: CommandHeader = serde_json::from_str(header_str)?;
                Ok(Some((header, frame.payload)))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
