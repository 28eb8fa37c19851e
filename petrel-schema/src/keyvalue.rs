//! Key-value composite schemas.
//!
//! Pairs two independent schemas into one combined wire encoding. The
//! paired form is self-describing: each half is length-prefixed so decode
//! can split without ambiguity.
//!
//! ```text
//! [key_len: u32][key_bytes][value_len: u32][value_bytes]
//! ```

use crate::error::SchemaError;
use crate::info::{SchemaInfo, SchemaType};
use crate::{HasDefaultSchema, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Descriptor property under which the encoding style is recorded.
pub const ENCODING_TYPE_PROPERTY: &str = "kv.encoding.type";

/// How the key travels relative to the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyValueEncodingType {
    /// Key and value share one payload buffer.
    Inline,
    /// Key bytes are carried out-of-band (message key field); the payload
    /// holds only the value.
    Separated,
}

impl KeyValueEncodingType {
    fn as_str(&self) -> &'static str {
        match self {
            KeyValueEncodingType::Inline => "INLINE",
            KeyValueEncodingType::Separated => "SEPARATED",
        }
    }
}

/// A decoded key-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> KeyValue<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

/// Embedded component descriptors carried in the composite descriptor's
/// format bytes.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct KeyValueSchemaData {
    pub key: SchemaInfo,
    pub value: SchemaInfo,
}

/// Composite schema pairing two independent schemas.
pub struct KeyValueSchema<K, V> {
    key_schema: Arc<dyn Schema<K>>,
    value_schema: Arc<dyn Schema<V>>,
    encoding: KeyValueEncodingType,
    info: SchemaInfo,
}

impl<K, V> KeyValueSchema<K, V> {
    /// Builds a composite from two existing schema instances, inline
    /// encoding.
    pub fn of(key_schema: Arc<dyn Schema<K>>, value_schema: Arc<dyn Schema<V>>) -> Self {
        Self::with_encoding(key_schema, value_schema, KeyValueEncodingType::Inline)
    }

    /// Builds a composite from two existing schema instances with an
    /// explicit encoding style.
    pub fn with_encoding(
        key_schema: Arc<dyn Schema<K>>,
        value_schema: Arc<dyn Schema<V>>,
        encoding: KeyValueEncodingType,
    ) -> Self {
        let data = KeyValueSchemaData {
            key: key_schema.info().clone(),
            value: value_schema.info().clone(),
        };
        // Component descriptors are plain serde types; this cannot fail.
        let schema_data = serde_json::to_vec(&data).unwrap_or_default();

        let info = SchemaInfo::new("KeyValue", SchemaType::KeyValue)
            .with_schema_data(schema_data)
            .with_property(ENCODING_TYPE_PROPERTY, encoding.as_str());

        Self {
            key_schema,
            value_schema,
            encoding,
            info,
        }
    }

    /// Builds a composite from two raw types using their default schemas
    /// and an explicit encoding style selector.
    pub fn of_types(encoding: KeyValueEncodingType) -> Self
    where
        K: HasDefaultSchema,
        V: HasDefaultSchema,
    {
        Self::with_encoding(K::default_schema(), V::default_schema(), encoding)
    }

    pub fn encoding(&self) -> KeyValueEncodingType {
        self.encoding
    }

    /// Encodes the pair into separate key and value byte buffers, for
    /// transports that carry the key out-of-band.
    pub fn encode_separated(&self, kv: &KeyValue<K, V>) -> Result<(Vec<u8>, Vec<u8>), SchemaError> {
        Ok((
            self.key_schema.encode(&kv.key)?,
            self.value_schema.encode(&kv.value)?,
        ))
    }

    /// Inverse of [`encode_separated`](Self::encode_separated).
    pub fn decode_separated(
        &self,
        key_bytes: &[u8],
        value_bytes: &[u8],
    ) -> Result<KeyValue<K, V>, SchemaError> {
        Ok(KeyValue::new(
            self.key_schema.decode(key_bytes)?,
            self.value_schema.decode(value_bytes)?,
        ))
    }
}

impl<K: 'static, V: 'static> Schema<KeyValue<K, V>> for KeyValueSchema<K, V> {
    fn encode(&self, kv: &KeyValue<K, V>) -> Result<Vec<u8>, SchemaError> {
        let key_bytes = self.key_schema.encode(&kv.key)?;
        let value_bytes = self.value_schema.encode(&kv.value)?;
        Ok(encode_pair(&key_bytes, &value_bytes))
    }

    fn decode(&self, bytes: &[u8]) -> Result<KeyValue<K, V>, SchemaError> {
        let (key_bytes, value_bytes) = split_pair(bytes)?;
        self.decode_separated(key_bytes, value_bytes)
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// Concatenates two byte buffers into the length-prefixed paired form.
pub(crate) fn encode_pair(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + key.len() + value.len());
    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
    out
}

/// Splits a paired buffer back into key and value byte slices.
pub(crate) fn split_pair(bytes: &[u8]) -> Result<(&[u8], &[u8]), SchemaError> {
    let who = "key-value pair";
    let read_len = |at: usize| -> Result<usize, SchemaError> {
        let end = at.checked_add(4).filter(|&e| e <= bytes.len()).ok_or_else(|| {
            SchemaError::Serialization(format!("truncated {}: missing length prefix", who))
        })?;
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[at..end]);
        Ok(u32::from_be_bytes(len) as usize)
    };

    let key_len = read_len(0)?;
    let key_end = 4usize
        .checked_add(key_len)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| {
            SchemaError::Serialization(format!("truncated {}: key shorter than declared", who))
        })?;
    let key = &bytes[4..key_end];

    let value_len = read_len(key_end)?;
    let value_start = key_end + 4;
    let value_end = value_start
        .checked_add(value_len)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| {
            SchemaError::Serialization(format!("truncated {}: value shorter than declared", who))
        })?;
    if value_end != bytes.len() {
        return Err(SchemaError::Serialization(format!(
            "trailing bytes after {}",
            who
        )));
    }

    Ok((key, &bytes[value_start..value_end]))
}
