//! Schema-agnostic value model.
//!
//! [`GenericSchema`] is the decode target of descriptor resolution: instead
//! of a concrete Rust type it produces [`GenericValue`], tagged by the
//! descriptor's schema type. Used by auto-consume mode where the concrete
//! type is not known at construction time.

use crate::error::SchemaError;
use crate::info::{SchemaInfo, SchemaType};
use crate::keyvalue::{self, KeyValueSchemaData};
use crate::primitive::{
    BooleanSchema, BytesSchema, DateSchema, DoubleSchema, FloatSchema, Int16Schema, Int32Schema,
    Int64Schema, Int8Schema, StringSchema, TimeSchema, TimestampSchema,
};
use crate::Schema;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// A dynamically typed payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Bytes(Vec<u8>),
    String(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    KeyValue(Box<GenericValue>, Box<GenericValue>),
}

impl GenericValue {
    fn kind(&self) -> &'static str {
        match self {
            GenericValue::Bytes(_) => "Bytes",
            GenericValue::String(_) => "String",
            GenericValue::Int8(_) => "Int8",
            GenericValue::Int16(_) => "Int16",
            GenericValue::Int32(_) => "Int32",
            GenericValue::Int64(_) => "Int64",
            GenericValue::Boolean(_) => "Boolean",
            GenericValue::Float(_) => "Float",
            GenericValue::Double(_) => "Double",
            GenericValue::Date(_) => "Date",
            GenericValue::Time(_) => "Time",
            GenericValue::Timestamp(_) => "Timestamp",
            GenericValue::Json(_) => "Json",
            GenericValue::KeyValue(_, _) => "KeyValue",
        }
    }
}

enum Codec {
    Bytes(BytesSchema),
    String(StringSchema),
    Int8(Int8Schema),
    Int16(Int16Schema),
    Int32(Int32Schema),
    Int64(Int64Schema),
    Boolean(BooleanSchema),
    Float(FloatSchema),
    Double(DoubleSchema),
    Date(DateSchema),
    Time(TimeSchema),
    Timestamp(TimestampSchema),
    Json,
    KeyValue {
        key: Box<GenericSchema>,
        value: Box<GenericSchema>,
    },
}

/// A codec constructed from a wire descriptor, decoding to
/// [`GenericValue`].
pub struct GenericSchema {
    info: SchemaInfo,
    codec: Codec,
}

impl GenericSchema {
    /// Builds a generic codec from a descriptor.
    ///
    /// Composite descriptors must embed their component descriptors in the
    /// format bytes; a missing or unparsable embedding is
    /// [`SchemaError::Parse`]. Unknown or auto type tags are
    /// [`SchemaError::UnsupportedType`].
    pub fn of(info: SchemaInfo) -> Result<Self, SchemaError> {
        let codec = match info.schema_type {
            SchemaType::Bytes => Codec::Bytes(BytesSchema::new()),
            SchemaType::String => Codec::String(StringSchema::utf8()),
            SchemaType::Int8 => Codec::Int8(Int8Schema::new()),
            SchemaType::Int16 => Codec::Int16(Int16Schema::new()),
            SchemaType::Int32 => Codec::Int32(Int32Schema::new()),
            SchemaType::Int64 => Codec::Int64(Int64Schema::new()),
            SchemaType::Boolean => Codec::Boolean(BooleanSchema::new()),
            SchemaType::Float => Codec::Float(FloatSchema::new()),
            SchemaType::Double => Codec::Double(DoubleSchema::new()),
            SchemaType::Date => Codec::Date(DateSchema::new()),
            SchemaType::Time => Codec::Time(TimeSchema::new()),
            SchemaType::Timestamp => Codec::Timestamp(TimestampSchema::new()),
            SchemaType::Json => Codec::Json,
            SchemaType::KeyValue => {
                let data: KeyValueSchemaData =
                    serde_json::from_slice(&info.schema).map_err(|e| {
                        SchemaError::Parse(format!(
                            "key-value descriptor missing component schemas: {}",
                            e
                        ))
                    })?;
                Codec::KeyValue {
                    key: Box::new(GenericSchema::of(data.key)?),
                    value: Box::new(GenericSchema::of(data.value)?),
                }
            }
            SchemaType::AutoConsume | SchemaType::AutoProduce => {
                return Err(SchemaError::UnsupportedType(info.schema_type))
            }
        };

        Ok(Self { info, codec })
    }

    fn mismatch(&self, value: &GenericValue) -> SchemaError {
        SchemaError::Serialization(format!(
            "value variant {} does not match schema type {}",
            value.kind(),
            self.info.schema_type
        ))
    }
}

impl Schema<GenericValue> for GenericSchema {
    fn encode(&self, value: &GenericValue) -> Result<Vec<u8>, SchemaError> {
        match (&self.codec, value) {
            (Codec::Bytes(s), GenericValue::Bytes(v)) => s.encode(v),
            (Codec::String(s), GenericValue::String(v)) => s.encode(v),
            (Codec::Int8(s), GenericValue::Int8(v)) => s.encode(v),
            (Codec::Int16(s), GenericValue::Int16(v)) => s.encode(v),
            (Codec::Int32(s), GenericValue::Int32(v)) => s.encode(v),
            (Codec::Int64(s), GenericValue::Int64(v)) => s.encode(v),
            (Codec::Boolean(s), GenericValue::Boolean(v)) => s.encode(v),
            (Codec::Float(s), GenericValue::Float(v)) => s.encode(v),
            (Codec::Double(s), GenericValue::Double(v)) => s.encode(v),
            (Codec::Date(s), GenericValue::Date(v)) => s.encode(v),
            (Codec::Time(s), GenericValue::Time(v)) => s.encode(v),
            (Codec::Timestamp(s), GenericValue::Timestamp(v)) => s.encode(v),
            (Codec::Json, GenericValue::Json(v)) => {
                serde_json::to_vec(v).map_err(SchemaError::ser)
            }
            (Codec::KeyValue { key, value: val }, GenericValue::KeyValue(k, v)) => {
                let key_bytes = key.encode(k)?;
                let value_bytes = val.encode(v)?;
                Ok(keyvalue::encode_pair(&key_bytes, &value_bytes))
            }
            _ => Err(self.mismatch(value)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<GenericValue, SchemaError> {
        match &self.codec {
            Codec::Bytes(s) => s.decode(bytes).map(GenericValue::Bytes),
            Codec::String(s) => s.decode(bytes).map(GenericValue::String),
            Codec::Int8(s) => s.decode(bytes).map(GenericValue::Int8),
            Codec::Int16(s) => s.decode(bytes).map(GenericValue::Int16),
            Codec::Int32(s) => s.decode(bytes).map(GenericValue::Int32),
            Codec::Int64(s) => s.decode(bytes).map(GenericValue::Int64),
            Codec::Boolean(s) => s.decode(bytes).map(GenericValue::Boolean),
            Codec::Float(s) => s.decode(bytes).map(GenericValue::Float),
            Codec::Double(s) => s.decode(bytes).map(GenericValue::Double),
            Codec::Date(s) => s.decode(bytes).map(GenericValue::Date),
            Codec::Time(s) => s.decode(bytes).map(GenericValue::Time),
            Codec::Timestamp(s) => s.decode(bytes).map(GenericValue::Timestamp),
            Codec::Json => serde_json::from_slice(bytes)
                .map(GenericValue::Json)
                .map_err(SchemaError::ser),
            Codec::KeyValue { key, value } => {
                let (key_bytes, value_bytes) = keyvalue::split_pair(bytes)?;
                Ok(GenericValue::KeyValue(
                    Box::new(key.decode(key_bytes)?),
                    Box::new(value.decode(value_bytes)?),
                ))
            }
        }
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvalue::{KeyValueEncodingType, KeyValueSchema};
    use crate::primitive::{Int32Schema, StringSchema};
    use std::sync::Arc;

    #[test]
    fn test_generic_scalar_roundtrip() {
        let schema = GenericSchema::of(SchemaInfo::new("n", SchemaType::Int64)).unwrap();
        let value = GenericValue::Int64(i64::MIN);
        let encoded = schema.encode(&value).unwrap();
        assert_eq!(schema.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_generic_string_roundtrip() {
        let schema = GenericSchema::of(SchemaInfo::new("s", SchemaType::String)).unwrap();
        let value = GenericValue::String("hello".to_string());
        let encoded = schema.encode(&value).unwrap();
        assert_eq!(schema.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_variant_mismatch_is_serialization_error() {
        let schema = GenericSchema::of(SchemaInfo::new("n", SchemaType::Int32)).unwrap();
        let result = schema.encode(&GenericValue::String("nope".to_string()));
        assert!(matches!(result, Err(SchemaError::Serialization(_))));
    }

    #[test]
    fn test_auto_tags_unsupported() {
        let result = GenericSchema::of(SchemaInfo::new("a", SchemaType::AutoConsume));
        assert!(matches!(
            result,
            Err(SchemaError::UnsupportedType(SchemaType::AutoConsume))
        ));
    }

    #[test]
    fn test_generic_key_value_roundtrip() {
        // Build the composite descriptor the way a typed schema would emit it.
        let typed: KeyValueSchema<String, i32> = KeyValueSchema::with_encoding(
            Arc::new(StringSchema::utf8()),
            Arc::new(Int32Schema::new()),
            KeyValueEncodingType::Inline,
        );
        let schema = GenericSchema::of(typed.info().clone()).unwrap();

        let value = GenericValue::KeyValue(
            Box::new(GenericValue::String("k".to_string())),
            Box::new(GenericValue::Int32(5)),
        );
        let encoded = schema.encode(&value).unwrap();
        assert_eq!(schema.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_key_value_descriptor_without_components_fails() {
        let result = GenericSchema::of(SchemaInfo::new("kv", SchemaType::KeyValue));
        assert!(matches!(result, Err(SchemaError::Parse(_))));
    }

    #[test]
    fn test_generic_json_roundtrip() {
        let schema = GenericSchema::of(SchemaInfo::new("doc", SchemaType::Json)).unwrap();
        let value = GenericValue::Json(serde_json::json!({"a": 1, "b": ["x", "y"]}));
        let encoded = schema.encode(&value).unwrap();
        assert_eq!(schema.decode(&encoded).unwrap(), value);
    }
}
