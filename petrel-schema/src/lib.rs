//! # petrel-schema
//!
//! Schema codec framework for Petrel.
//!
//! This crate provides:
//! - The [`Schema`] trait: a named, typed encode/decode strategy
//! - Scalar schemas (bytes, string, integers, bool, floats, temporal types)
//! - A JSON structured schema with a reusable, lock-guarded encode buffer
//! - Key-value composite schemas (inline and separated encodings)
//! - Auto produce/consume schemas and descriptor-driven resolution

pub mod auto;
pub mod error;
pub mod generic;
pub mod info;
pub mod keyvalue;
pub mod primitive;
pub mod registry;
pub mod structured;

pub use auto::{AutoConsumeSchema, AutoProduceBytesSchema};
pub use error::SchemaError;
pub use generic::{GenericSchema, GenericValue};
pub use info::{SchemaInfo, SchemaType};
pub use keyvalue::{KeyValue, KeyValueEncodingType, KeyValueSchema};
pub use primitive::{
    BooleanSchema, BytesSchema, DateSchema, DoubleSchema, FloatSchema, Int16Schema, Int32Schema,
    Int64Schema, Int8Schema, StringSchema, TimeSchema, TimestampSchema,
};
pub use structured::JsonSchema;

use std::sync::Arc;

/// A typed encode/decode strategy plus its wire metadata.
///
/// Schema instances are immutable after construction apart from internal
/// reusable encode buffers, which each implementation guards with its own
/// lock. One instance may be shared by any number of producers and
/// consumers; `encode` and `decode` are safe to call concurrently.
pub trait Schema<T>: Send + Sync {
    /// Encodes a value into wire bytes.
    fn encode(&self, value: &T) -> Result<Vec<u8>, SchemaError>;

    /// Decodes wire bytes back into a value.
    fn decode(&self, bytes: &[u8]) -> Result<T, SchemaError>;

    /// Returns the descriptor for this schema.
    fn info(&self) -> &SchemaInfo;
}

/// Types with a canonical default schema.
///
/// This is the compile-time factory used where a composite schema is built
/// from two raw types rather than two schema instances.
pub trait HasDefaultSchema: Sized {
    fn default_schema() -> Arc<dyn Schema<Self>>;
}

impl HasDefaultSchema for Vec<u8> {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::BytesSchema::new())
    }
}

impl HasDefaultSchema for String {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::StringSchema::utf8())
    }
}

impl HasDefaultSchema for i8 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::Int8Schema::new())
    }
}

impl HasDefaultSchema for i16 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::Int16Schema::new())
    }
}

impl HasDefaultSchema for i32 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::Int32Schema::new())
    }
}

impl HasDefaultSchema for i64 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::Int64Schema::new())
    }
}

impl HasDefaultSchema for bool {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::BooleanSchema::new())
    }
}

impl HasDefaultSchema for f32 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::FloatSchema::new())
    }
}

impl HasDefaultSchema for f64 {
    fn default_schema() -> Arc<dyn Schema<Self>> {
        Arc::new(primitive::DoubleSchema::new())
    }
}
