//! # petrel-client
//!
//! Client library for Petrel.
//!
//! This crate provides:
//! - Async TCP client with optional TLS (trust-store or mutual TLS)
//! - Per-connection command correlation over one multiplexed socket
//! - Typed producers with schema codecs and interceptor chains
//! - Push-event delivery for unsolicited broker commands

pub mod auth;
pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
pub mod message;
pub mod producer;
pub mod stream;
pub mod tls;

pub use auth::{Authentication, AuthenticationTls, AuthenticationToken};
pub use client::Client;
pub use connection::{Connection, ConnectionConfig, PushEvent, TlsClientConfig};
pub use dispatcher::{ConnectionState, Dispatcher};
pub use error::ClientError;
pub use interceptor::{InterceptorError, ProducerInterceptor, ProducerInterceptors};
pub use message::{Message, MessageId};
pub use producer::Producer;
