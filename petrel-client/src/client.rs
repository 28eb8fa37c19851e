//! High-level client API.

use crate::connection::{Connection, ConnectionConfig, PushEvent};
use crate::error::ClientError;
use crate::interceptor::{ProducerInterceptor, ProducerInterceptors};
use crate::producer::Producer;
use crate::message::MessageId;
use petrel_protocol::{
    AckParams, CloseConsumerParams, CommandType, FlowParams, SubscribeParams,
};
use petrel_schema::Schema;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// High-level client for a Petrel broker.
///
/// Owns the connection and its background read loop; producers are
/// created through it and share the connection.
pub struct Client {
    conn: Arc<Connection>,
    next_producer_id: AtomicU64,
    next_consumer_id: AtomicU64,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connects to the broker and starts the background read loop.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let conn = Arc::new(Connection::new(config));
        conn.connect().await?;

        let read_conn = conn.clone();
        let read_task = tokio::spawn(async move {
            if let Err(e) = read_conn.read_loop().await {
                tracing::debug!("read loop ended: {}", e);
            }
        });

        Ok(Self {
            conn,
            next_producer_id: AtomicU64::new(1),
            next_consumer_id: AtomicU64::new(1),
            read_task: Mutex::new(Some(read_task)),
        })
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Subscribes to broker push events (deliveries, forced closes).
    pub fn push_events(&self) -> tokio::sync::broadcast::Receiver<PushEvent> {
        self.conn.subscribe_push_events()
    }

    /// Pings the broker.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let (response, _) = self
            .conn
            .request(CommandType::Ping, json!({}), bytes::Bytes::new())
            .await?;
        if response.kind != CommandType::Pong {
            return Err(ClientError::UnexpectedResponse(response.kind));
        }
        Ok(())
    }

    /// Creates a producer on a topic with no interceptors.
    pub async fn create_producer<T>(
        &self,
        topic: impl Into<String>,
        schema: Arc<dyn Schema<T>>,
    ) -> Result<Producer<T>, ClientError> {
        self.create_producer_with_interceptors(topic, schema, Vec::new())
            .await
    }

    /// Creates a producer with an interceptor chain. Interceptors run
    /// in the given order on every publish.
    pub async fn create_producer_with_interceptors<T>(
        &self,
        topic: impl Into<String>,
        schema: Arc<dyn Schema<T>>,
        interceptors: Vec<Box<dyn ProducerInterceptor<T>>>,
    ) -> Result<Producer<T>, ClientError> {
        let producer_id = self.next_producer_id.fetch_add(1, Ordering::Relaxed);
        let producer_name = format!("petrel-producer-{}", Uuid::new_v4());

        Producer::create(
            self.conn.clone(),
            topic.into(),
            producer_id,
            Some(producer_name),
            schema,
            ProducerInterceptors::new(interceptors),
        )
        .await
    }

    /// Subscribes a consumer to a topic and returns its consumer id.
    /// Deliveries arrive as [`PushEvent::Message`] on the push channel
    /// once flow permits are granted.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        subscription: impl Into<String>,
    ) -> Result<u64, ClientError> {
        let consumer_id = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);
        let params = SubscribeParams {
            topic: topic.into(),
            subscription: subscription.into(),
            consumer_id,
        };
        let (response, _) = self
            .conn
            .request(
                CommandType::Subscribe,
                serde_json::to_value(params)?,
                bytes::Bytes::new(),
            )
            .await?;
        if response.kind != CommandType::Success {
            return Err(ClientError::UnexpectedResponse(response.kind));
        }
        Ok(consumer_id)
    }

    /// Grants the broker permits to push messages to a consumer.
    pub async fn flow(&self, consumer_id: u64, permits: u32) -> Result<(), ClientError> {
        let params = FlowParams {
            consumer_id,
            permits,
        };
        self.conn
            .send_no_response(CommandType::Flow, serde_json::to_value(params)?)
            .await
    }

    /// Acknowledges a delivered message.
    pub async fn ack(&self, consumer_id: u64, message_id: MessageId) -> Result<(), ClientError> {
        let params = AckParams {
            consumer_id,
            message_id,
        };
        self.conn
            .send_no_response(CommandType::Ack, serde_json::to_value(params)?)
            .await
    }

    /// Releases a consumer on the broker.
    pub async fn close_consumer(&self, consumer_id: u64) -> Result<(), ClientError> {
        let params = CloseConsumerParams { consumer_id };
        let (response, _) = self
            .conn
            .request(
                CommandType::CloseConsumer,
                serde_json::to_value(params)?,
                bytes::Bytes::new(),
            )
            .await?;
        if response.kind != CommandType::Success {
            return Err(ClientError::UnexpectedResponse(response.kind));
        }
        Ok(())
    }

    /// Closes the client: stops the read loop and shuts the connection
    /// down. Pending requests are failed.
    pub async fn close(&self) -> Result<(), ClientError> {
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.conn.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::InterceptorError;
    use crate::message::{Message, MessageId};
    use bytes::Bytes;
    use parking_lot::Mutex as SyncMutex;
    use petrel_protocol::{
        max_frame_size, CommandHeader, ConnectedParams, Decoder, Encoder, ErrorParams, Frame,
        MessageIdData, MessageParams, ProducerParams, ProducerSuccessParams, SendParams,
        SendReceiptParams, ServerErrorCode, DEFAULT_MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
    };
    use petrel_schema::StringSchema;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const FRAME_LIMIT: u32 = max_frame_size(DEFAULT_MAX_MESSAGE_SIZE);

    async fn read_command(socket: &mut TcpStream, decoder: &mut Decoder) -> (CommandHeader, Bytes) {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(cmd) = decoder.decode_command().unwrap() {
                return cmd;
            }
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed the connection");
            decoder.extend(&buf[..n]);
        }
    }

    async fn write_command(socket: &mut TcpStream, header: &CommandHeader, payload: Bytes) {
        let encoded = Encoder::encode_command(header, payload, FRAME_LIMIT).unwrap();
        socket.write_all(&encoded).await.unwrap();
    }

    /// Accepts one connection and answers the CONNECT handshake.
    async fn accept_and_handshake(
        listener: TcpListener,
        max_message_size: u32,
    ) -> (TcpStream, Decoder) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut decoder = Decoder::new(FRAME_LIMIT);

        let (header, _) = read_command(&mut socket, &mut decoder).await;
        assert_eq!(header.kind, CommandType::Connect);
        let request_id = header.request_id.unwrap();

        let connected = ConnectedParams {
            protocol_version: PROTOCOL_VERSION,
            server_version: "test-broker/0.1".to_string(),
            max_message_size,
        };
        let reply = CommandHeader::new(CommandType::Connected)
            .with_request_id(request_id)
            .with_params(serde_json::to_value(connected).unwrap());
        write_command(&mut socket, &reply, Bytes::new()).await;

        (socket, decoder)
    }

    async fn bind_broker() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_negotiates_max_message_size_and_ping() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) = accept_and_handshake(listener, 1024 * 1024).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Ping);
            let reply =
                CommandHeader::new(CommandType::Pong).with_request_id(header.request_id.unwrap());
            write_command(&mut socket, &reply, Bytes::new()).await;
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        assert!(client.is_connected());
        // The broker's smaller limit wins.
        assert_eq!(client.connection().max_message_size(), 1024 * 1024);

        client.ping().await.unwrap();

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    struct Uppercase;

    impl ProducerInterceptor<String> for Uppercase {
        fn before_send(
            &self,
            _topic: &str,
            mut message: Message<String>,
        ) -> Result<Message<String>, InterceptorError> {
            message.value = message.value.to_uppercase();
            Ok(message)
        }

        fn on_send_acknowledgement(
            &self,
            _topic: &str,
            _message: &Message<String>,
            _message_id: Option<&MessageId>,
            _error: Option<&ClientError>,
        ) -> Result<(), InterceptorError> {
            Ok(())
        }
    }

    struct RecordingAck {
        acks: Arc<SyncMutex<Vec<(String, Option<MessageId>, Option<String>)>>>,
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
            message: &Message<String>,
            message_id: Option<&MessageId>,
            error: Option<&ClientError>,
        ) -> Result<(), InterceptorError> {
            self.acks.lock().push((
                message.value.clone(),
                message_id.copied(),
                error.map(|e| e.to_string()),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_producer_send_runs_interceptors_and_schema() {
        let (listener, addr) = bind_broker().await;
        let seen_payload = Arc::new(SyncMutex::new(Vec::new()));
        let broker_seen = seen_payload.clone();

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Producer);
            let params: ProducerParams = serde_json::from_value(header.params).unwrap();
            assert_eq!(params.topic, "greetings");
            let reply = CommandHeader::new(CommandType::ProducerSuccess)
                .with_request_id(header.request_id.unwrap())
                .with_params(
                    serde_json::to_value(ProducerSuccessParams {
                        producer_name: "p-1".to_string(),
                        last_sequence_id: -1,
                    })
                    .unwrap(),
                );
            write_command(&mut socket, &reply, Bytes::new()).await;

            let (header, payload) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Send);
            let send: SendParams = serde_json::from_value(header.params).unwrap();
            broker_seen.lock().extend_from_slice(&payload);
            let reply = CommandHeader::new(CommandType::SendReceipt)
                .with_request_id(header.request_id.unwrap())
                .with_params(
                    serde_json::to_value(SendReceiptParams {
                        producer_id: send.producer_id,
                        sequence_id: send.sequence_id,
                        message_id: MessageIdData {
                            ledger_id: 7,
                            entry_id: send.sequence_id,
                        },
                    })
                    .unwrap(),
                );
            write_command(&mut socket, &reply, Bytes::new()).await;
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        let acks = Arc::new(SyncMutex::new(Vec::new()));
        let producer = client
            .create_producer_with_interceptors(
                "greetings",
                Arc::new(StringSchema::utf8()),
                vec![
                    Box::new(Uppercase) as Box<dyn ProducerInterceptor<String>>,
                    Box::new(RecordingAck { acks: acks.clone() }),
                ],
            )
            .await
            .unwrap();
        assert_eq!(producer.producer_name(), "p-1");

        let message_id = producer.send("hello".to_string()).await.unwrap();
        assert_eq!(message_id, MessageIdData { ledger_id: 7, entry_id: 0 });

        // The broker received the interceptor-transformed, schema-encoded value.
        assert_eq!(seen_payload.lock().as_slice(), b"HELLO");

        // The acknowledgement callback saw the final message and id, no error.
        let recorded = acks.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "HELLO");
        assert_eq!(recorded[0].1, Some(message_id));
        assert!(recorded[0].2.is_none());
        drop(recorded);

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_receipt_still_acknowledges() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Producer);
            let reply = CommandHeader::new(CommandType::ProducerSuccess)
                .with_request_id(header.request_id.unwrap())
                .with_params(
                    serde_json::to_value(ProducerSuccessParams {
                        producer_name: "p-1".to_string(),
                        last_sequence_id: -1,
                    })
                    .unwrap(),
                );
            write_command(&mut socket, &reply, Bytes::new()).await;

            // A receipt with no message_id cannot be parsed by the client.
            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Send);
            let reply = CommandHeader::new(CommandType::SendReceipt)
                .with_request_id(header.request_id.unwrap())
                .with_params(json!({ "producer_id": 1, "sequence_id": 0 }));
            write_command(&mut socket, &reply, Bytes::new()).await;
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        let acks = Arc::new(SyncMutex::new(Vec::new()));
        let producer = client
            .create_producer_with_interceptors(
                "greetings",
                Arc::new(StringSchema::utf8()),
                vec![Box::new(RecordingAck { acks: acks.clone() })
                    as Box<dyn ProducerInterceptor<String>>],
            )
            .await
            .unwrap();

        let result = producer.send("hello".to_string()).await;
        assert!(matches!(result, Err(ClientError::Json(_))));

        // The acknowledgement hook still fired, carrying the failure.
        let recorded = acks.lock();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].1.is_none());
        assert!(recorded[0].2.is_some());
        drop(recorded);

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_receipts_match_their_senders() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Producer);
            let reply = CommandHeader::new(CommandType::ProducerSuccess)
                .with_request_id(header.request_id.unwrap())
                .with_params(
                    serde_json::to_value(ProducerSuccessParams {
                        producer_name: "p-1".to_string(),
                        last_sequence_id: -1,
                    })
                    .unwrap(),
                );
            write_command(&mut socket, &reply, Bytes::new()).await;

            // Collect both sends, then answer them in reverse order.
            let mut sends = Vec::new();
            for _ in 0..2 {
                let (header, _) = read_command(&mut socket, &mut decoder).await;
                assert_eq!(header.kind, CommandType::Send);
                let params: SendParams = serde_json::from_value(header.params.clone()).unwrap();
                sends.push((header.request_id.unwrap(), params));
            }
            sends.reverse();
            for (request_id, params) in sends {
                let reply = CommandHeader::new(CommandType::SendReceipt)
                    .with_request_id(request_id)
                    .with_params(
                        serde_json::to_value(SendReceiptParams {
                            producer_id: params.producer_id,
                            sequence_id: params.sequence_id,
                            message_id: MessageIdData {
                                ledger_id: 1,
                                entry_id: params.sequence_id,
                            },
                        })
                        .unwrap(),
                    );
                write_command(&mut socket, &reply, Bytes::new()).await;
            }
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        let producer = client
            .create_producer("events", Arc::new(StringSchema::utf8()))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            producer.send("a".to_string()),
            producer.send("b".to_string()),
        );
        // Each sender gets the receipt for its own sequence id even
        // though the broker replied in reverse.
        assert_eq!(first.unwrap().entry_id, 0);
        assert_eq!(second.unwrap().entry_id, 1);

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_mapped() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Producer);
            let reply = CommandHeader::new(CommandType::Error)
                .with_request_id(header.request_id.unwrap())
                .with_params(
                    serde_json::to_value(ErrorParams {
                        code: ServerErrorCode::AuthorizationError,
                        message: "not allowed".to_string(),
                        retryable: false,
                    })
                    .unwrap(),
                );
            write_command(&mut socket, &reply, Bytes::new()).await;
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        let result = client
            .create_producer("forbidden", Arc::new(StringSchema::utf8()))
            .await;

        match result {
            Err(err @ ClientError::ServerError { .. }) => {
                assert!(!err.is_retryable());
                assert!(err.to_string().contains("not allowed"));
            }
            other => panic!("expected server error, got {:?}", other.map(|_| ())),
        }

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_fails_pending_and_closes() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Ping);

            // A length prefix beyond the negotiated limit; the client
            // rejects it without waiting for the frame body.
            socket
                .write_all(&(FRAME_LIMIT + 1).to_be_bytes())
                .await
                .unwrap();

            // Hold the socket open until the client hangs up.
            let mut buf = [0u8; 16];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        assert!(client.is_connected());

        // The in-flight ping is failed when the read loop tears down.
        let result = client.ping().await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
        assert!(!client.is_connected());
        assert_eq!(client.connection().pending_count(), 0);

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_command_is_skipped() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Ping);

            // A well-framed command whose header is not valid UTF-8,
            // followed by the real PONG.
            let bad = Frame::new(Bytes::from(&[0xff, 0xfe, 0xfd][..]), Bytes::new())
                .encode(FRAME_LIMIT)
                .unwrap();
            socket.write_all(&bad).await.unwrap();
            let reply =
                CommandHeader::new(CommandType::Pong).with_request_id(header.request_id.unwrap());
            write_command(&mut socket, &reply, Bytes::new()).await;

            // Hold the socket open until the client hangs up.
            let mut buf = [0u8; 16];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();

        // The bad command is dropped; the stream stays aligned and the
        // PONG behind it still completes the request.
        client.ping().await.unwrap();
        assert!(client.is_connected());

        client.close().await.unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_flow_and_push_delivery() {
        let (listener, addr) = bind_broker().await;

        let broker = tokio::spawn(async move {
            let (mut socket, mut decoder) =
                accept_and_handshake(listener, DEFAULT_MAX_MESSAGE_SIZE).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Subscribe);
            let sub: SubscribeParams = serde_json::from_value(header.params).unwrap();
            assert_eq!(sub.topic, "events");
            assert_eq!(sub.subscription, "mine");
            let reply =
                CommandHeader::new(CommandType::Success).with_request_id(header.request_id.unwrap());
            write_command(&mut socket, &reply, Bytes::new()).await;

            // FLOW carries no request id; the delivery follows it.
            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Flow);
            let flow: FlowParams = serde_json::from_value(header.params).unwrap();
            assert_eq!(flow.permits, 10);

            let push = CommandHeader::new(CommandType::Message).with_params(
                serde_json::to_value(MessageParams {
                    consumer_id: sub.consumer_id,
                    message_id: MessageIdData { ledger_id: 9, entry_id: 4 },
                    partition_key: Some("k".to_string()),
                    properties: Default::default(),
                    publish_time: None,
                })
                .unwrap(),
            );
            write_command(&mut socket, &push, Bytes::from(&b"delivered"[..])).await;

            let (header, _) = read_command(&mut socket, &mut decoder).await;
            assert_eq!(header.kind, CommandType::Ack);
            let ack: AckParams = serde_json::from_value(header.params).unwrap();
            assert_eq!(ack.message_id, MessageIdData { ledger_id: 9, entry_id: 4 });
        });

        let client = Client::connect(ConnectionConfig::new(addr)).await.unwrap();
        let mut events = client.push_events();

        let consumer_id = client.subscribe("events", "mine").await.unwrap();
        client.flow(consumer_id, 10).await.unwrap();

        match events.recv().await.unwrap() {
            PushEvent::Message {
                consumer_id: delivered_to,
                message_id,
                payload,
                ..
            } => {
                assert_eq!(delivered_to, consumer_id);
                assert_eq!(message_id, MessageIdData { ledger_id: 9, entry_id: 4 });
                assert_eq!(payload.as_ref(), b"delivered");
                client.ack(consumer_id, message_id).await.unwrap();
            }
            other => panic!("unexpected event: {:?}", other),
        }

        broker.await.unwrap();
        client.close().await.unwrap();
    }
}
