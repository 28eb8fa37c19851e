//! Producer interceptor chain.
//!
//! Interceptors observe and transform messages on the publish path. A
//! failing interceptor never fails the publish: its error is logged and
//! the chain continues with the last good message.

use crate::error::ClientError;
use crate::message::{Message, MessageId};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

/// Errors surfaced by interceptor hooks.
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

/// Hooks invoked around message publication.
///
/// `before_send` may transform the message; `on_send_acknowledgement`
/// fires once per publish attempt with either the assigned id or the
/// failure. Hooks must not block for long: they run on the send path.
pub trait ProducerInterceptor<T>: Send + Sync {
    /// Called before the message is encoded and sent. The returned
    /// message replaces the input for the rest of the chain.
    fn before_send(&self, topic: &str, message: Message<T>) -> Result<Message<T>, InterceptorError>;

    /// Called when the broker acknowledges the message or the publish
    /// fails. Exactly one of `message_id` and `error` is set.
    fn on_send_acknowledgement(
        &self,
        topic: &str,
        message: &Message<T>,
        message_id: Option<&MessageId>,
        error: Option<&ClientError>,
    ) -> Result<(), InterceptorError>;

    /// Called once when the owning producer closes.
    fn close(&self) -> Result<(), InterceptorError> {
        Ok(())
    }
}

/// Ordered interceptor chain owned by a producer.
pub struct ProducerInterceptors<T> {
    interceptors: Vec<Box<dyn ProducerInterceptor<T>>>,
    closed: AtomicBool,
}

impl<T> ProducerInterceptors<T> {
    pub fn new(interceptors: Vec<Box<dyn ProducerInterceptor<T>>>) -> Self {
        Self {
            interceptors,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Runs the message through every interceptor in registration
    /// order. A hook that errors is skipped; the previous message
    /// continues down the chain.
    pub fn before_send(&self, topic: &str, message: Message<T>) -> Message<T>
    where
        T: Clone,
    {
        if self.closed.load(Ordering::Acquire) {
            warn!(topic, "interceptor chain invoked after close");
            return message;
        }
        let mut current = message;
        for interceptor in &self.interceptors {
            match interceptor.before_send(topic, current.clone()) {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(topic, %err, "interceptor before_send failed, skipping");
                }
            }
        }
        current
    }

    /// Notifies every interceptor of the publish outcome. Hook errors
    /// are logged and do not stop later hooks.
    pub fn on_send_acknowledgement(
        &self,
        topic: &str,
        message: &Message<T>,
        message_id: Option<&MessageId>,
        error: Option<&ClientError>,
    ) {
        if self.closed.load(Ordering::Acquire) {
            warn!(topic, "interceptor chain invoked after close");
            return;
        }
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.on_send_acknowledgement(topic, message, message_id, error)
            {
                warn!(topic, %err, "interceptor on_send_acknowledgement failed");
            }
        }
    }

    /// Closes every interceptor. Later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.close() {
                error!(%err, "interceptor close failed");
            }
        }
    }
}
