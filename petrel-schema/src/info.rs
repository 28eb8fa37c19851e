//! Schema descriptors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Wire-level schema type tags.
///
/// These names are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    Bytes,
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    Boolean,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    Json,
    KeyValue,
    AutoConsume,
    AutoProduce,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Bytes => write!(f, "BYTES"),
            SchemaType::String => write!(f, "STRING"),
            SchemaType::Int8 => write!(f, "INT8"),
            SchemaType::Int16 => write!(f, "INT16"),
            SchemaType::Int32 => write!(f, "INT32"),
            SchemaType::Int64 => write!(f, "INT64"),
            SchemaType::Boolean => write!(f, "BOOLEAN"),
            SchemaType::Float => write!(f, "FLOAT"),
            SchemaType::Double => write!(f, "DOUBLE"),
            SchemaType::Date => write!(f, "DATE"),
            SchemaType::Time => write!(f, "TIME"),
            SchemaType::Timestamp => write!(f, "TIMESTAMP"),
            SchemaType::Json => write!(f, "JSON"),
            SchemaType::KeyValue => write!(f, "KEY_VALUE"),
            SchemaType::AutoConsume => write!(f, "AUTO_CONSUME"),
            SchemaType::AutoProduce => write!(f, "AUTO_PRODUCE"),
        }
    }
}

/// Schema descriptor: type tag, optional format definition bytes and
/// free-form properties.
///
/// This is the unit exchanged with the broker's schema registry; resolving
/// a descriptor yields a concrete codec (see [`crate::registry::resolve`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub schema_type: SchemaType,
    /// Format definition bytes (e.g. a JSON record description); empty for
    /// scalar schemas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<u8>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl SchemaInfo {
    pub fn new(name: impl Into<String>, schema_type: SchemaType) -> Self {
        Self {
            name: name.into(),
            schema_type,
            schema: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_schema_data(mut self, schema: Vec<u8>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_type_serialization() {
        let json = serde_json::to_string(&SchemaType::KeyValue).unwrap();
        assert_eq!(json, "\"KEY_VALUE\"");

        let parsed: SchemaType = serde_json::from_str("\"AUTO_CONSUME\"").unwrap();
        assert_eq!(parsed, SchemaType::AutoConsume);
    }

    #[test]
    fn test_schema_type_display_matches_wire_name() {
        assert_eq!(format!("{}", SchemaType::Int64), "INT64");
        assert_eq!(format!("{}", SchemaType::AutoProduce), "AUTO_PRODUCE");
    }

    #[test]
    fn test_schema_info_roundtrip() {
        let info = SchemaInfo::new("orders", SchemaType::Json)
            .with_schema_data(br#"{"record":"Order"}"#.to_vec())
            .with_property("owner", "billing");

        let json = serde_json::to_string(&info).unwrap();
        let parsed: SchemaInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_empty_fields_omitted() {
        let info = SchemaInfo::new("raw", SchemaType::Bytes);
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("properties"));
        assert!(!json.contains("\"schema\""));
    }
}
