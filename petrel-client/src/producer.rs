//! Typed message producer.
//!
//! A producer binds a topic, a schema and an interceptor chain to a
//! connection. Values are run through the interceptors, encoded by the
//! schema, and published with a producer-scoped sequence id; the
//! broker's receipt carries the assigned message id.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::interceptor::ProducerInterceptors;
use crate::message::{Message, MessageId};
use bytes::Bytes;
use chrono::DateTime;
use petrel_protocol::{
    CommandType, CloseProducerParams, ProducerParams, ProducerSuccessParams, SendErrorParams,
    SendParams, SendReceiptParams,
};
use petrel_schema::Schema;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A producer registered with the broker on a single topic.
pub struct Producer<T> {
    conn: Arc<Connection>,
    topic: String,
    producer_id: u64,
    producer_name: String,
    schema: Arc<dyn Schema<T>>,
    interceptors: ProducerInterceptors<T>,
    next_sequence_id: AtomicU64,
    closed: AtomicBool,
}

impl<T> Producer<T> {
    /// Registers a producer with the broker. The broker assigns a name
    /// when none is given and reports the last persisted sequence id
    /// (-1 for a brand-new producer).
    pub(crate) async fn create(
        conn: Arc<Connection>,
        topic: String,
        producer_id: u64,
        producer_name: Option<String>,
        schema: Arc<dyn Schema<T>>,
        interceptors: ProducerInterceptors<T>,
    ) -> Result<Self, ClientError> {
        let params = ProducerParams {
            topic: topic.clone(),
            producer_id,
            producer_name,
        };

        let (response, _) = conn
            .request(
                CommandType::Producer,
                serde_json::to_value(params)?,
                Bytes::new(),
            )
            .await?;

        if response.kind != CommandType::ProducerSuccess {
            return Err(ClientError::UnexpectedResponse(response.kind));
        }
        let success: ProducerSuccessParams = serde_json::from_value(response.params)?;

        debug!(
            topic,
            producer_id,
            producer_name = %success.producer_name,
            last_sequence_id = success.last_sequence_id,
            "producer registered"
        );

        let next_sequence_id = (success.last_sequence_id + 1).max(0) as u64;

        Ok(Self {
            conn,
            topic,
            producer_id,
            producer_name: success.producer_name,
            schema,
            interceptors,
            next_sequence_id: AtomicU64::new(next_sequence_id),
            closed: AtomicBool::new(false),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn producer_id(&self) -> u64 {
        self.producer_id
    }

    /// Name assigned by the broker at registration.
    pub fn producer_name(&self) -> &str {
        &self.producer_name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publishes a value with no key or properties.
    pub async fn send(&self, value: T) -> Result<MessageId, ClientError>
    where
        T: Clone,
    {
        self.send_message(Message::new(value)).await
    }

    /// Publishes a message and waits for the broker's receipt.
    ///
    /// Interceptors run first and may transform the message; the schema
    /// then encodes the final value. Every attempt ends with exactly one
    /// acknowledgement callback, success or failure.
    pub async fn send_message(&self, message: Message<T>) -> Result<MessageId, ClientError>
    where
        T: Clone,
    {
        if self.is_closed() {
            return Err(ClientError::ProducerClosed);
        }

        let message = self.interceptors.before_send(&self.topic, message);

        let encoded = match self.schema.encode(&message.value) {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = ClientError::Schema(e);
                self.interceptors
                    .on_send_acknowledgement(&self.topic, &message, None, Some(&err));
                return Err(err);
            }
        };

        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::Relaxed);
        let params = SendParams {
            producer_id: self.producer_id,
            sequence_id,
            partition_key: message.key.clone(),
            properties: message.properties.clone(),
            event_time: message
                .event_time
                .and_then(DateTime::from_timestamp_millis),
        };

        // Failures past this point must all flow into `outcome` so the
        // acknowledgement hook fires exactly once per attempt.
        let outcome = match self.publish(params, Bytes::from(encoded)).await {
            Ok(response) => match response.kind {
                CommandType::SendReceipt => {
                    serde_json::from_value::<SendReceiptParams>(response.params)
                        .map(|receipt| receipt.message_id)
                        .map_err(ClientError::Json)
                }
                CommandType::SendError => {
                    match serde_json::from_value::<SendErrorParams>(response.params) {
                        Ok(send_error) => Err(ClientError::ServerError {
                            retryable: send_error.code.is_retryable(),
                            code: send_error.code,
                            message: send_error.message,
                        }),
                        Err(e) => Err(ClientError::Json(e)),
                    }
                }
                other => Err(ClientError::UnexpectedResponse(other)),
            },
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(message_id) => {
                self.interceptors
                    .on_send_acknowledgement(&self.topic, &message, Some(message_id), None);
            }
            Err(err) => {
                self.interceptors
                    .on_send_acknowledgement(&self.topic, &message, None, Some(err));
            }
        }

        outcome
    }

    async fn publish(
        &self,
        params: SendParams,
        payload: Bytes,
    ) -> Result<petrel_protocol::CommandHeader, ClientError> {
        let value = serde_json::to_value(params)?;
        let (response, _) = self.conn.request(CommandType::Send, value, payload).await?;
        Ok(response)
    }

    /// Closes the producer. The broker-side release is best effort; the
    /// interceptor chain is always closed.
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let params = CloseProducerParams {
            producer_id: self.producer_id,
        };
        match serde_json::to_value(params) {
            Ok(value) => {
                if let Err(err) = self
                    .conn
                    .request(CommandType::CloseProducer, value, Bytes::new())
                    .await
                {
                    warn!(producer_id = self.producer_id, %err, "close producer request failed");
                }
            }
            Err(err) => {
                warn!(producer_id = self.producer_id, %err, "close producer encode failed");
            }
        }

        self.interceptors.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::interceptor::{InterceptorError, ProducerInterceptor};
    use parking_lot::Mutex;
    use petrel_schema::StringSchema;

    fn detached_producer(interceptors: ProducerInterceptors<String>) -> Producer<String> {
        let conn = Arc::new(Connection::new(ConnectionConfig::new(
            "127.0.0.1:7650".parse().unwrap(),
        )));
        Producer {
            conn,
            topic: "test-topic".to_string(),
            producer_id: 1,
            producer_name: "p-test".to_string(),
            schema: Arc::new(StringSchema::utf8()),
            interceptors,
            next_sequence_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    struct RecordingAck {
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl ProducerInterceptor<String> for RecordingAck {
        fn before_send(
            &self,
            _topic: &str,
            message: Message<String>,
        ) -> Result<Message<String>, InterceptorError> {
            Ok(message)
        }

        fn on_send_acknowledgement(
            &self,
            _topic: &str,
            _message: &Message<String>,
            _message_id: Option<&MessageId>,
            error: Option<&ClientError>,
        ) -> Result<(), InterceptorError> {
            if let Some(err) = error {
                self.errors.lock().push(err.to_string());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_on_closed_producer() {
        let producer = detached_producer(ProducerInterceptors::new(Vec::new()));
        producer.closed.store(true, Ordering::Release);
        let result = producer.send("hello".to_string()).await;
        assert!(matches!(result, Err(ClientError::ProducerClosed)));
    }

    #[tokio::test]
    async fn test_send_without_connection_acks_failure() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let interceptors = ProducerInterceptors::new(vec![Box::new(RecordingAck {
            errors: errors.clone(),
        })
            as Box<dyn ProducerInterceptor<String>>]);
        let producer = detached_producer(interceptors);

        // The connection was never established, so the request fails
        // and the interceptor observes exactly one error callback.
        let result = producer.send("hello".to_string()).await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert_eq!(errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let producer = detached_producer(ProducerInterceptors::new(Vec::new()));
        producer.close().await.unwrap();
        assert!(producer.is_closed());
        producer.close().await.unwrap();
    }
}
