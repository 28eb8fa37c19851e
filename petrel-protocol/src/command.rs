//! Command envelope and parameter types for PCP.
//!
//! A command travels as the JSON header of a frame; the message payload (if
//! any) rides the frame's payload section untouched.

use crate::error::ServerErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// PCP command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    // Session management
    Connect,
    Connected,
    Ping,
    Pong,

    // Producer lifecycle
    Producer,
    ProducerSuccess,
    CloseProducer,

    // Publishing
    Send,
    SendReceipt,
    SendError,

    // Consuming
    Subscribe,
    Flow,
    Message,
    Ack,
    CloseConsumer,

    // Generic responses
    Success,
    Error,
}

/// Command header envelope, serialized as the frame's header bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHeader {
    /// Command type.
    #[serde(rename = "type")]
    pub kind: CommandType,

    /// Correlation id for request/response matching. Absent on unsolicited
    /// commands (broker pushes, keepalive probes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,

    /// Command-specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl CommandHeader {
    pub fn new(kind: CommandType) -> Self {
        Self {
            kind,
            request_id: None,
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Identifier assigned by the broker to a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageIdData {
    pub ledger_id: u64,
    pub entry_id: u64,
}

// ============================================================================
// Command-specific parameter types
// ============================================================================

/// Parameters for CONNECT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    pub protocol_version: u16,
    pub client_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_data: Option<String>,
}

/// Parameters for CONNECTED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedParams {
    pub protocol_version: u16,
    pub server_version: String,
    /// Maximum message size the broker accepts; clients must not exceed it.
    pub max_message_size: u32,
}

/// Parameters for PRODUCER (registration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerParams {
    pub topic: String,
    pub producer_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_name: Option<String>,
}

/// Parameters for PRODUCER_SUCCESS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerSuccessParams {
    pub producer_name: String,
    /// Last sequence id persisted for this producer, -1 if none.
    pub last_sequence_id: i64,
}

/// Parameters for SEND.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendParams {
    pub producer_id: u64,
    pub sequence_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

/// Parameters for SEND_RECEIPT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceiptParams {
    pub producer_id: u64,
    pub sequence_id: u64,
    pub message_id: MessageIdData,
}

/// Parameters for SEND_ERROR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendErrorParams {
    pub producer_id: u64,
    pub sequence_id: u64,
    pub code: ServerErrorCode,
    pub message: String,
}

/// Parameters for SUBSCRIBE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub topic: String,
    pub subscription: String,
    pub consumer_id: u64,
}

/// Parameters for FLOW (consumer permits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowParams {
    pub consumer_id: u64,
    pub permits: u32,
}

/// Parameters for MESSAGE (broker push; no request id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageParams {
    pub consumer_id: u64,
    pub message_id: MessageIdData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,
}

/// Parameters for ACK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckParams {
    pub consumer_id: u64,
    pub message_id: MessageIdData,
}

/// Parameters for CLOSE_PRODUCER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseProducerParams {
    pub producer_id: u64,
}

/// Parameters for CLOSE_CONSUMER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseConsumerParams {
    pub consumer_id: u64,
}

/// Parameters for ERROR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorParams {
    pub code: ServerErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl ErrorParams {
    pub fn new(code: ServerErrorCode, message: impl Into<String>) -> Self {
        Self {
            retryable: code.is_retryable(),
            code,
            message: message.into(),
        }
    }
}
