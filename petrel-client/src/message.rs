//! Outgoing message envelope.

use std::collections::HashMap;

/// Identifier assigned by the broker once a message is persisted.
pub use petrel_protocol::MessageIdData as MessageId;

/// A typed message with routing key, user properties and event time.
///
/// The value is encoded by the producer's schema at send time.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    pub value: T,
    pub key: Option<String>,
    pub properties: HashMap<String, String>,
    pub event_time: Option<i64>,
}

impl<T> Message<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            key: None,
            properties: HashMap::new(),
            event_time: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Event time in epoch milliseconds.
    pub fn with_event_time(mut self, event_time: i64) -> Self {
        self.event_time = Some(event_time);
        self
    }
}
