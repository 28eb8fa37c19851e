//! # petrel
//!
//! Client library for the Petrel pub/sub messaging platform.
//!
//! This facade re-exports the workspace crates:
//! - [`protocol`] - binary framing and the PCP command protocol
//! - [`schema`] - typed payload codecs (scalar, JSON, key-value, auto)
//! - [`client`] - async TCP/TLS client, producers, interceptors

pub use petrel_client as client;
pub use petrel_protocol as protocol;
pub use petrel_schema as schema;

pub use petrel_client::{
    Authentication, Client, ClientError, ConnectionConfig, Message, MessageId, Producer,
    ProducerInterceptor, TlsClientConfig,
};
pub use petrel_schema::{Schema, SchemaError, SchemaInfo, SchemaType};
