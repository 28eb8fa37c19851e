//! Schema-agnostic auto modes.
//!
//! Auto-produce passes bytes through unchanged on the write side while
//! remaining addressable as a schema value. Auto-consume defers choosing a
//! decode strategy until a descriptor arrives out-of-band (a registry
//! lookup), after construction.

use crate::error::SchemaError;
use crate::generic::{GenericSchema, GenericValue};
use crate::info::{SchemaInfo, SchemaType};
use crate::{registry, Schema};
use parking_lot::RwLock;

/// Write-side identity schema: bytes in, bytes out.
#[derive(Debug)]
pub struct AutoProduceBytesSchema {
    info: SchemaInfo,
}

impl AutoProduceBytesSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("AutoProduce", SchemaType::AutoProduce),
        }
    }
}

impl Default for AutoProduceBytesSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<Vec<u8>> for AutoProduceBytesSchema {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, SchemaError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, SchemaError> {
        Ok(bytes.to_vec())
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// Read-side schema that resolves its concrete decode strategy lazily.
///
/// Construction takes no type information. Once a descriptor is supplied
/// via [`configure`](Self::configure), decode delegates to the resolved
/// codec; decoding earlier fails with [`SchemaError::NotConfigured`].
pub struct AutoConsumeSchema {
    info: SchemaInfo,
    inner: RwLock<Option<GenericSchema>>,
}

impl AutoConsumeSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("AutoConsume", SchemaType::AutoConsume),
            inner: RwLock::new(None),
        }
    }

    /// Supplies the wire descriptor and resolves the decode strategy.
    ///
    /// May be called again when the topic's schema changes; subsequent
    /// decodes use the latest resolved codec.
    pub fn configure(&self, info: SchemaInfo) -> Result<(), SchemaError> {
        let resolved = registry::resolve(&info)?;
        *self.inner.write() = Some(resolved);
        Ok(())
    }

    /// Returns whether a descriptor has been supplied.
    pub fn is_configured(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl Default for AutoConsumeSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<GenericValue> for AutoConsumeSchema {
    fn encode(&self, _value: &GenericValue) -> Result<Vec<u8>, SchemaError> {
        Err(SchemaError::Serialization(
            "AUTO_CONSUME schema is decode-only".to_string(),
        ))
    }

    fn decode(&self, bytes: &[u8]) -> Result<GenericValue, SchemaError> {
        let inner = self.inner.read();
        inner
            .as_ref()
            .ok_or(SchemaError::NotConfigured)?
            .decode(bytes)
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}
