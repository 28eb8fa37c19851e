//! Protocol error types and server error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or command handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: u32 },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid UTF-8 in command header")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error is fatal to the connection that produced
    /// it. Fatal errors require a disconnect; the caller must reconnect.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::FrameTooLarge { .. }
                | ProtocolError::MalformedFrame(_)
                | ProtocolError::UnsupportedVersion(_)
                | ProtocolError::Io(_)
        )
    }
}

/// Stable error codes returned by the broker in ERROR and SEND_ERROR
/// commands.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerErrorCode {
    UnknownError,
    MetadataError,
    PersistenceError,
    AuthenticationError,
    AuthorizationError,
    TopicNotFound,
    ProducerBusy,
    ConsumerBusy,
    IncompatibleSchema,
    TooManyRequests,
    ServiceNotReady,
}

impl ServerErrorCode {
    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServerErrorCode::PersistenceError
                | ServerErrorCode::TooManyRequests
                | ServerErrorCode::ServiceNotReady
        )
    }
}

impl fmt::Display for ServerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErrorCode::UnknownError => write!(f, "UNKNOWN_ERROR"),
            ServerErrorCode::MetadataError => write!(f, "METADATA_ERROR"),
            ServerErrorCode::PersistenceError => write!(f, "PERSISTENCE_ERROR"),
            ServerErrorCode::AuthenticationError => write!(f, "AUTHENTICATION_ERROR"),
            ServerErrorCode::AuthorizationError => write!(f, "AUTHORIZATION_ERROR"),
            ServerErrorCode::TopicNotFound => write!(f, "TOPIC_NOT_FOUND"),
            ServerErrorCode::ProducerBusy => write!(f, "PRODUCER_BUSY"),
            ServerErrorCode::ConsumerBusy => write!(f, "CONSUMER_BUSY"),
            ServerErrorCode::IncompatibleSchema => write!(f, "INCOMPATIBLE_SCHEMA"),
            ServerErrorCode::TooManyRequests => write!(f, "TOO_MANY_REQUESTS"),
            ServerErrorCode::ServiceNotReady => write!(f, "SERVICE_NOT_READY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_code_retryable() {
        assert!(ServerErrorCode::PersistenceError.is_retryable());
        assert!(ServerErrorCode::TooManyRequests.is_retryable());
        assert!(ServerErrorCode::ServiceNotReady.is_retryable());

        assert!(!ServerErrorCode::TopicNotFound.is_retryable());
        assert!(!ServerErrorCode::AuthenticationError.is_retryable());
        assert!(!ServerErrorCode::IncompatibleSchema.is_retryable());
    }

    #[test]
    fn test_server_error_code_serialization() {
        let code = ServerErrorCode::TopicNotFound;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"TOPIC_NOT_FOUND\"");

        let parsed: ServerErrorCode = serde_json::from_str("\"PRODUCER_BUSY\"").unwrap();
        assert_eq!(parsed, ServerErrorCode::ProducerBusy);
    }

    #[test]
    fn test_server_error_code_display_matches_wire_name() {
        assert_eq!(
            format!("{}", ServerErrorCode::IncompatibleSchema),
            "INCOMPATIBLE_SCHEMA"
        );
        assert_eq!(
            format!("{}", ServerErrorCode::TooManyRequests),
            "TOO_MANY_REQUESTS"
        );
    }

    #[test]
    fn test_connection_fatal_classification() {
        assert!(ProtocolError::FrameTooLarge { size: 10, max: 5 }.is_connection_fatal());
        assert!(ProtocolError::MalformedFrame("x".into()).is_connection_fatal());
        assert!(ProtocolError::UnsupportedVersion(9).is_connection_fatal());
        assert!(!ProtocolError::InvalidUtf8.is_connection_fatal());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::UnsupportedVersion(9);
        assert!(err.to_string().contains("9"));

        let err = ProtocolError::MalformedFrame("bad header".into());
        assert!(err.to_string().contains("bad header"));
    }
}
