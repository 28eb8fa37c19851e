//! Scalar schemas: fixed-width big-endian encodings for primitive values.

use crate::error::SchemaError;
use crate::info::{SchemaInfo, SchemaType};
use crate::Schema;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

fn fixed<const N: usize>(bytes: &[u8], ty: SchemaType) -> Result<[u8; N], SchemaError> {
    bytes.try_into().map_err(|_| {
        SchemaError::Serialization(format!(
            "{} payload must be exactly {} bytes, got {}",
            ty,
            N,
            bytes.len()
        ))
    })
}

/// Raw bytes passthrough schema.
#[derive(Debug)]
pub struct BytesSchema {
    info: SchemaInfo,
}

impl BytesSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Bytes", SchemaType::Bytes),
        }
    }
}

impl Default for BytesSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<Vec<u8>> for BytesSchema {
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

/// UTF-8 string schema. The character set is recorded as a schema property
/// so the descriptor stays self-describing on the wire.
#[derive(Debug)]
pub struct StringSchema {
    info: SchemaInfo,
}

impl StringSchema {
    pub fn utf8() -> Self {
        Self {
            info: SchemaInfo::new("String", SchemaType::String)
                .with_property("__charset", "UTF-8"),
        }
    }
}

impl Schema<String> for StringSchema {
    fn encode(&self, value: &String) -> Result<Vec<u8>, SchemaError> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, SchemaError> {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(SchemaError::ser)
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

macro_rules! int_schema {
    ($name:ident, $ty:ty, $schema_type:expr, $width:expr) => {
        #[derive(Debug)]
        pub struct $name {
            info: SchemaInfo,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    info: SchemaInfo::new(stringify!($ty), $schema_type),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Schema<$ty> for $name {
            fn encode(&self, value: &$ty) -> Result<Vec<u8>, SchemaError> {
                Ok(value.to_be_bytes().to_vec())
            }

            fn decode(&self, bytes: &[u8]) -> Result<$ty, SchemaError> {
                Ok(<$ty>::from_be_bytes(fixed::<$width>(bytes, $schema_type)?))
            }

            fn info(&self) -> &SchemaInfo {
                &self.info
            }
        }
    };
}

int_schema!(Int8Schema, i8, SchemaType::Int8, 1);
int_schema!(Int16Schema, i16, SchemaType::Int16, 2);
int_schema!(Int32Schema, i32, SchemaType::Int32, 4);
int_schema!(Int64Schema, i64, SchemaType::Int64, 8);

/// Single-byte boolean schema. Only 0 and 1 are valid wire values.
#[derive(Debug)]
pub struct BooleanSchema {
    info: SchemaInfo,
}

impl BooleanSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Boolean", SchemaType::Boolean),
        }
    }
}

impl Default for BooleanSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<bool> for BooleanSchema {
    fn encode(&self, value: &bool) -> Result<Vec<u8>, SchemaError> {
        Ok(vec![u8::from(*value)])
    }

    fn decode(&self, bytes: &[u8]) -> Result<bool, SchemaError> {
        match fixed::<1>(bytes, SchemaType::Boolean)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [b] => Err(SchemaError::Serialization(format!(
                "invalid boolean byte: {:#x}",
                b
            ))),
        }
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// IEEE-754 single precision, big-endian bit pattern.
#[derive(Debug)]
pub struct FloatSchema {
    info: SchemaInfo,
}

impl FloatSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Float", SchemaType::Float),
        }
    }
}

impl Default for FloatSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<f32> for FloatSchema {
    fn encode(&self, value: &f32) -> Result<Vec<u8>, SchemaError> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<f32, SchemaError> {
        Ok(f32::from_be_bytes(fixed::<4>(bytes, SchemaType::Float)?))
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// IEEE-754 double precision, big-endian bit pattern.
#[derive(Debug)]
pub struct DoubleSchema {
    info: SchemaInfo,
}

impl DoubleSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Double", SchemaType::Double),
        }
    }
}

impl Default for DoubleSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<f64> for DoubleSchema {
    fn encode(&self, value: &f64) -> Result<Vec<u8>, SchemaError> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<f64, SchemaError> {
        Ok(f64::from_be_bytes(fixed::<8>(bytes, SchemaType::Double)?))
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// Calendar date encoded as epoch milliseconds at midnight UTC.
#[derive(Debug)]
pub struct DateSchema {
    info: SchemaInfo,
}

impl DateSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Date", SchemaType::Date),
        }
    }
}

impl Default for DateSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<NaiveDate> for DateSchema {
    fn encode(&self, value: &NaiveDate) -> Result<Vec<u8>, SchemaError> {
        let millis = value.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        Ok(millis.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<NaiveDate, SchemaError> {
        let millis = i64::from_be_bytes(fixed::<8>(bytes, SchemaType::Date)?);
        DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                SchemaError::Serialization(format!("date out of range: {} ms", millis))
            })
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// Time of day encoded as milliseconds since midnight.
#[derive(Debug)]
pub struct TimeSchema {
    info: SchemaInfo,
}

impl TimeSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Time", SchemaType::Time),
        }
    }
}

impl Default for TimeSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<NaiveTime> for TimeSchema {
    fn encode(&self, value: &NaiveTime) -> Result<Vec<u8>, SchemaError> {
        let millis = value.signed_duration_since(NaiveTime::MIN).num_milliseconds();
        Ok(millis.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<NaiveTime, SchemaError> {
        let millis = i64::from_be_bytes(fixed::<8>(bytes, SchemaType::Time)?);
        if millis < 0 {
            return Err(SchemaError::Serialization(format!(
                "negative time of day: {} ms",
                millis
            )));
        }
        NaiveTime::from_num_seconds_from_midnight_opt(
            (millis / 1000) as u32,
            ((millis % 1000) * 1_000_000) as u32,
        )
        .ok_or_else(|| SchemaError::Serialization(format!("time out of range: {} ms", millis)))
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}

/// Instant encoded as epoch milliseconds UTC.
#[derive(Debug)]
pub struct TimestampSchema {
    info: SchemaInfo,
}

impl TimestampSchema {
    pub fn new() -> Self {
        Self {
            info: SchemaInfo::new("Timestamp", SchemaType::Timestamp),
        }
    }
}

impl Default for TimestampSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema<DateTime<Utc>> for TimestampSchema {
    fn encode(&self, value: &DateTime<Utc>) -> Result<Vec<u8>, SchemaError> {
        Ok(value.timestamp_millis().to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<DateTime<Utc>, SchemaError> {
        let millis = i64::from_be_bytes(fixed::<8>(bytes, SchemaType::Timestamp)?);
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            SchemaError::Serialization(format!("timestamp out of range: {} ms", millis))
        })
    }

    fn info(&self) -> &SchemaInfo {
        &self.info
    }
}
