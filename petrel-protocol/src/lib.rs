//! # petrel-protocol
//!
//! Wire protocol implementation for Petrel (PCP - Petrel Command Protocol).
//!
//! This crate provides:
//! - Binary framing with a length prefix and a header-length field
//! - JSON command header serialization/deserialization
//! - Command envelope and parameter types
//! - Error codes and protocol constants

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;

pub use codec::{Decoder, Encoder};
pub use command::{
    AckParams, CloseConsumerParams, CloseProducerParams, CommandHeader, CommandType,
    ConnectParams, ConnectedParams, ErrorParams, FlowParams, MessageIdData, MessageParams,
    ProducerParams, ProducerSuccessParams, SendErrorParams, SendParams, SendReceiptParams,
    SubscribeParams,
};
pub use error::{ProtocolError, ServerErrorCode};
pub use frame::{Frame, HEADER_LENGTH_SIZE, LENGTH_PREFIX_SIZE};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port for Petrel brokers.
pub const DEFAULT_PORT: u16 = 7650;

/// Default maximum message payload size (5 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 5 * 1024 * 1024;

/// Fixed allowance for the command header on top of the message payload.
///
/// The frame decoder accepts frames up to the configured maximum message
/// size plus this padding; anything larger fails the connection.
pub const FRAME_HEADER_PADDING: u32 = 10 * 1024;

/// Maximum decodable frame size for a given maximum message size.
pub const fn max_frame_size(max_message_size: u32) -> u32 {
    max_message_size + FRAME_HEADER_PADDING
}
