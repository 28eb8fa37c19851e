//! Descriptor resolution.
//!
//! Maps a wire-level schema descriptor (type tag + format bytes +
//! properties) to a constructed codec. The descriptor itself is fetched
//! out-of-band by the caller, typically from a broker schema-registry
//! lookup keyed by topic; this crate only performs the mapping.

use crate::error::SchemaError;
use crate::generic::GenericSchema;
use crate::info::SchemaInfo;

/// Resolves a descriptor to a generic codec.
///
/// Unknown or unsupported type tags fail with
/// [`SchemaError::UnsupportedType`]; composite descriptors with missing
/// component schemas fail with [`SchemaError::Parse`].
pub fn resolve(info: &SchemaInfo) -> Result<GenericSchema, SchemaError> {
    GenericSchema::of(info.clone())
}
