//! Structured schemas: format-described record encodings.
//!
//! The JSON structured schema parses its format definition once at
//! construction and reuses it for every encode/decode. Encoding reuses a
//! per-instance output buffer guarded by a lock so one schema instance can
//! be shared by any number of producer threads; the buffer is reset on
//! every exit path, including errors.

use crate::error::SchemaError;
use crate::info::{SchemaInfo, SchemaType};
use crate::Schema;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;

/// JSON-described record schema for any serde type.
pub struct JsonSchema<T> {
    info: SchemaInfo,
    /// Reusable encode buffer. Lock scope never crosses a user callback.
    buffer: Mutex<Vec<u8>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchema<T> {
    /// Builds a schema from the Rust type alone.
    pub fn of() -> Self {
        Self {
            info: SchemaInfo::new(short_type_name::<T>(), SchemaType::Json),
            buffer: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Builds a schema from the Rust type with descriptor properties.
    pub fn of_with_properties(properties: HashMap<String, String>) -> Self {
        let mut schema = Self::of();
        schema.info = schema.info.with_properties(properties);
        schema
    }

    /// Builds a schema from a supplied JSON record definition string.
    ///
    /// The definition is parsed once here; an unparsable definition fails
    /// construction with [`SchemaError::Parse`].
    pub fn of_definition(
        definition: &str,
        properties: HashMap<String, String>,
    ) -> Result<Self, SchemaError> {
        let parsed: serde_json::Value = serde_json::from_str(definition)
            .map_err(|e| SchemaError::Parse(format!("invalid JSON schema definition: {}", e)))?;
        let canonical = serde_json::to_vec(&parsed)
            .map_err(|e| SchemaError::Parse(format!("invalid JSON schema definition: {}", e)))?;

        Ok(Self {
            info: SchemaInfo::new(short_type_name::<T>(), SchemaType::Json)
                .with_schema_data(canonical)
                .with_properties(properties),
            buffer: Mutex::new(Vec::new()),
            _marker: PhantomData,
        })
    }
}

impl<T> Schema<T> for JsonSchema<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, SchemaError> {
        let mut buf = self.buffer.lock();
        let result = serde_json::to_writer(&mut *buf, value);
        // The buffer must be left empty whether or not the write succeeded.
        let out = match result {
            Ok(()) => Ok(buf.to_vec()),
            Err(e) => Err(SchemaError::ser(e)),
        };
        buf.clear();
        out
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, SchemaError> {
        // Fresh lightweight reader per call: no decode state is shared
        // across concurrent callers.
        serde_json::from_slice(bytes).map_err(SchemaError::ser)
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}
