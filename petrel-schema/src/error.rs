//! Schema error types.

use crate::info::SchemaType;
use thiserror::Error;

/// Errors raised by schema construction, encoding and decoding.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A single encode or decode call failed. Never corrupts shared codec
    /// state; reusable buffers are reset on every exit path.
    #[error("schema serialization error: {0}")]
    Serialization(String),

    /// The supplied schema definition could not be parsed. Fatal to the
    /// schema instance being constructed.
    #[error("invalid schema definition: {0}")]
    Parse(String),

    /// Descriptor resolution encountered a type tag this client cannot
    /// handle.
    #[error("unsupported schema type: {0}")]
    UnsupportedType(SchemaType),

    /// An auto-consume schema was asked to decode before a descriptor was
    /// supplied.
    #[error("schema not configured for decoding")]
    NotConfigured,
}

impl SchemaError {
    pub(crate) fn ser(err: impl std::fmt::Display) -> Self {
        SchemaError::Serialization(err.to_string())
    }
}
