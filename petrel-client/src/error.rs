//! Client error types.

use petrel_protocol::ServerErrorCode;
use petrel_schema::SchemaError;
use thiserror::Error;

/// Client errors.
///
/// Every error falls into one of three recovery classes, exposed through
/// [`is_retryable`](ClientError::is_retryable),
/// [`requires_reconnect`](ClientError::requires_reconnect) and
/// [`requires_config_change`](ClientError::requires_config_change).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] petrel_protocol::ProtocolError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("producer already closed")]
    ProducerClosed,

    #[error("correlation id space exhausted")]
    RequestIdExhausted,

    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(petrel_protocol::CommandType),

    #[error("broker error: {code} - {message}")]
    ServerError {
        code: ServerErrorCode,
        message: String,
        retryable: bool,
    },

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Returns whether the same request may be retried on the same
    /// connection.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::ServerError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns whether the caller must re-establish the connection before
    /// retrying.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            ClientError::Io(_) | ClientError::ConnectionClosed | ClientError::NotConnected => true,
            ClientError::Protocol(p) => p.is_connection_fatal(),
            _ => false,
        }
    }

    /// Returns whether retrying is pointless until configuration is fixed.
    pub fn requires_config_change(&self) -> bool {
        matches!(
            self,
            ClientError::TlsConfig(_)
                | ClientError::TlsHandshake(_)
                | ClientError::Schema(SchemaError::Parse(_))
                | ClientError::Schema(SchemaError::UnsupportedType(_))
        )
    }
}
