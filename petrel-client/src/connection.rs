//! Connection management.
//!
//! A [`Connection`] owns one TCP (optionally TLS) stream to a broker.
//! Writers share the write half behind a lock so a frame is always
//! written whole; a single read loop drains the read half and routes
//! responses through the [`Dispatcher`] and broker pushes through a
//! broadcast channel.

use crate::auth::Authentication;
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;
use crate::stream::ClientStream;
use crate::tls::{create_insecure_tls_connector, create_tls_connector};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use petrel_protocol::{
    max_frame_size, CommandHeader, CommandType, ConnectParams, ConnectedParams, Decoder, Encoder,
    ErrorParams, MessageIdData, MessageParams, DEFAULT_MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// TLS configuration for client connections.
#[derive(Debug, Clone, Default)]
pub struct TlsClientConfig {
    /// Enable TLS for the connection.
    pub enabled: bool,
    /// Path to PEM-encoded CA certificate(s) for server verification.
    /// If None, system roots are used.
    pub trust_certs_path: Option<PathBuf>,
    /// Skip server certificate verification (INSECURE - development only).
    pub insecure: bool,
    /// Server name for SNI (defaults to hostname from address).
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_trust_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_certs_path = Some(path.into());
        self.enabled = true;
        self
    }

    pub fn with_insecure(mut self) -> Self {
        self.insecure = true;
        self.enabled = true;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

/// Connection configuration.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Broker address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub operation_timeout: Duration,
    /// Largest message payload this client will accept. The broker may
    /// negotiate it down during the handshake.
    pub max_message_size: u32,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Client version string sent in CONNECT.
    pub client_version: String,
    /// Authentication provider (optional).
    pub auth: Option<Arc<dyn Authentication>>,
    /// TLS configuration (optional).
    pub tls: Option<TlsClientConfig>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("addr", &self.addr)
            .field("connect_timeout", &self.connect_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("max_message_size", &self.max_message_size)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("client_version", &self.client_version)
            .field("auth", &self.auth.as_ref().map(|a| a.auth_method().to_string()))
            .field("tls", &self.tls)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            client_version: format!("petrel-{}", env!("CARGO_PKG_VERSION")),
            auth: None,
            tls: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: u32) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn Authentication>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_tls(mut self, tls_config: TlsClientConfig) -> Self {
        self.tls = Some(tls_config);
        self
    }
}

/// Default capacity for the push event channel.
const PUSH_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Unsolicited commands pushed by the broker.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// A message delivered to a consumer.
    Message {
        consumer_id: u64,
        message_id: MessageIdData,
        partition_key: Option<String>,
        properties: HashMap<String, String>,
        publish_time: Option<DateTime<Utc>>,
        payload: Bytes,
    },
    /// The broker closed a producer.
    ProducerClosed { producer_id: u64 },
    /// The broker closed a consumer.
    ConsumerClosed { consumer_id: u64 },
}

/// A connection to a broker.
pub struct Connection {
    config: ConnectionConfig,
    /// Write half of the stream (for sending commands).
    writer: Mutex<Option<WriteHalf<ClientStream>>>,
    /// Read half of the stream (for receiving commands).
    reader: Mutex<Option<ReadHalf<ClientStream>>>,
    /// Decoder for parsing inbound frames.
    decoder: Mutex<Decoder>,
    /// Request correlation and connection state.
    dispatcher: Dispatcher,
    /// Negotiated maximum message payload size.
    max_message_size: AtomicU32,
    /// Broadcast channel for broker pushes.
    push_events: broadcast::Sender<PushEvent>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let (push_events, _) = broadcast::channel(PUSH_EVENT_CHANNEL_CAPACITY);
        let max_message_size = config.max_message_size;
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            decoder: Mutex::new(Decoder::new(max_frame_size(max_message_size))),
            dispatcher: Dispatcher::new(),
            max_message_size: AtomicU32::new(max_message_size),
            push_events,
        }
    }

    /// Subscribes to broker push events (deliveries, forced closes).
    pub fn subscribe_push_events(&self) -> broadcast::Receiver<PushEvent> {
        self.push_events.subscribe()
    }

    /// The maximum message payload size currently in effect.
    pub fn max_message_size(&self) -> u32 {
        self.max_message_size.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Connects to the broker and performs the CONNECT handshake.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let tcp_stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        tracing::debug!("TCP connected, configuring socket");
        tcp_stream.set_nodelay(true).ok();

        // Upgrade to TLS if configured
        let stream = if let Some(ref tls_config) = self.config.tls {
            if tls_config.enabled {
                let host = self.config.addr.ip().to_string();
                let (connector, server_name) = if tls_config.insecure {
                    tracing::warn!("Using insecure TLS (certificate verification disabled)");
                    create_insecure_tls_connector(tls_config, &host)?
                } else {
                    create_tls_connector(tls_config, self.config.auth.as_deref(), &host)?
                };

                tracing::debug!("Performing TLS handshake...");
                let tls_stream = connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;

                tracing::debug!("TLS handshake complete");
                ClientStream::Tls { stream: tls_stream }
            } else {
                ClientStream::Plain { stream: tcp_stream }
            }
        } else {
            ClientStream::Plain { stream: tcp_stream }
        };

        // Split into read/write halves for concurrent access
        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);
        *self.reader.lock().await = Some(read_half);
        self.decoder.lock().await.clear();

        tracing::debug!("Starting protocol handshake...");
        self.handshake().await?;
        tracing::debug!("Handshake complete");

        // Mark as connected only after successful handshake
        self.dispatcher.mark_connected();

        Ok(())
    }

    /// Performs the CONNECT/CONNECTED handshake. Reads the response
    /// directly from the stream since the read loop is not running yet.
    async fn handshake(&self) -> Result<(), ClientError> {
        let connect = ConnectParams {
            protocol_version: PROTOCOL_VERSION,
            client_version: self.config.client_version.clone(),
            auth_method: self
                .config
                .auth
                .as_ref()
                .map(|a| a.auth_method().to_string()),
            auth_data: self.config.auth.as_ref().and_then(|a| a.auth_data()),
        };

        let request_id = self.dispatcher.next_request_id()?;
        let header = CommandHeader::new(CommandType::Connect)
            .with_request_id(request_id)
            .with_params(serde_json::to_value(connect)?);

        self.write_frame(&header, Bytes::new()).await?;
        tracing::debug!("CONNECT sent, waiting for response...");

        let (response, _) = self.read_single_response().await?;
        match response.kind {
            CommandType::Connected => {}
            CommandType::Error => return Err(server_error(&response)),
            other => return Err(ClientError::UnexpectedResponse(other)),
        }

        let connected: ConnectedParams = serde_json::from_value(response.params)?;
        if connected.protocol_version > PROTOCOL_VERSION {
            return Err(ClientError::Protocol(
                petrel_protocol::ProtocolError::UnsupportedVersion(connected.protocol_version),
            ));
        }

        // Adopt the broker's limit and resize the frame decoder to match.
        let negotiated = connected
            .max_message_size
            .min(self.config.max_message_size);
        self.max_message_size.store(negotiated, Ordering::Release);
        self.decoder
            .lock()
            .await
            .set_max_frame_size(max_frame_size(negotiated));

        tracing::debug!(
            server_version = %connected.server_version,
            max_message_size = negotiated,
            "CONNECTED"
        );

        Ok(())
    }

    /// Reads a single command from the stream with timeout. Used during
    /// the handshake before the read loop is started.
    async fn read_single_response(&self) -> Result<(CommandHeader, Bytes), ClientError> {
        let buffer_size = self.config.read_buffer_size;
        let timeout = self.config.operation_timeout;

        tokio::time::timeout(timeout, async {
            let mut buf = vec![0u8; buffer_size];

            loop {
                let n = {
                    let mut reader_guard = self.reader.lock().await;
                    let reader = reader_guard.as_mut().ok_or(ClientError::NotConnected)?;
                    reader.read(&mut buf).await.map_err(ClientError::Io)?
                };

                if n == 0 {
                    tracing::debug!("Connection closed (0 bytes)");
                    return Err(ClientError::ConnectionClosed);
                }

                let mut decoder = self.decoder.lock().await;
                decoder.extend(&buf[..n]);
                if let Some(command) = decoder.decode_command()? {
                    return Ok(command);
                }
            }
        })
        .await
        .map_err(|_| {
            tracing::debug!("Handshake read timeout");
            ClientError::Timeout
        })?
    }

    /// Writes one encoded frame under the writer lock so it lands on
    /// the wire as a single unit.
    async fn write_frame(&self, header: &CommandHeader, payload: Bytes) -> Result<(), ClientError> {
        let frame_limit = max_frame_size(self.max_message_size());
        let encoded = Encoder::encode_command(header, payload, frame_limit)?;

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(&encoded).await.map_err(ClientError::Io)?;
        Ok(())
    }

    /// Sends a command and waits for its correlated response.
    ///
    /// The pending entry is registered before the frame is written, so
    /// a fast response can never race past its waiter. A response of
    /// type ERROR is converted into [`ClientError::ServerError`].
    pub async fn request(
        &self,
        kind: CommandType,
        params: serde_json::Value,
        payload: Bytes,
    ) -> Result<(CommandHeader, Bytes), ClientError> {
        if !self.dispatcher.is_connected() {
            tracing::debug!("request() called but not connected");
            return Err(ClientError::NotConnected);
        }

        let request_id = self.dispatcher.next_request_id()?;
        tracing::debug!(request_id, ?kind, "Sending request");
        let header = CommandHeader::new(kind)
            .with_request_id(request_id)
            .with_params(params);

        // Register before writing so the read loop always finds us.
        let rx = self.dispatcher.register(request_id);

        if let Err(err) = self.write_frame(&header, payload).await {
            self.dispatcher.cancel(request_id);
            return Err(err);
        }

        let (response, response_payload) =
            tokio::time::timeout(self.config.operation_timeout, rx)
                .await
                .map_err(|_| {
                    tracing::debug!(request_id, "Request timed out");
                    self.dispatcher.cancel(request_id);
                    ClientError::Timeout
                })?
                .map_err(|_| {
                    tracing::debug!(request_id, "Request channel closed");
                    ClientError::ConnectionClosed
                })?;

        if response.kind == CommandType::Error {
            return Err(server_error(&response));
        }

        Ok((response, response_payload))
    }

    /// Sends a command without waiting for a response (ACK, FLOW).
    pub async fn send_no_response(
        &self,
        kind: CommandType,
        params: serde_json::Value,
    ) -> Result<(), ClientError> {
        if !self.dispatcher.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let header = CommandHeader::new(kind).with_params(params);
        self.write_frame(&header, Bytes::new()).await
    }

    /// Reads and dispatches inbound commands (call this in a background
    /// task). Returns when the connection drops; every pending request
    /// is failed exactly once on the way out.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        tracing::debug!("read_loop started");
        let buffer_size = self.config.read_buffer_size;
        let mut buf = vec![0u8; buffer_size];

        let result = loop {
            let n = {
                let mut reader_guard = self.reader.lock().await;
                let reader = match reader_guard.as_mut() {
                    Some(r) => r,
                    None => break Err(ClientError::NotConnected),
                };
                match reader.read(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => break Err(ClientError::Io(e)),
                }
            };

            if n == 0 {
                tracing::debug!("read_loop: connection closed");
                break Err(ClientError::ConnectionClosed);
            }

            self.decoder.lock().await.extend(&buf[..n]);

            // Drain every complete command currently buffered.
            loop {
                let decoded = self.decoder.lock().await.decode_command();
                match decoded {
                    Ok(Some((header, payload))) => {
                        if let Err(e) = self.dispatch(header, payload).await {
                            tracing::error!(%e, "read_loop: dispatch failed, closing");
                            self.fail_and_close();
                            return Err(e);
                        }
                    }
                    Ok(None) => break,
                    Err(e) if !e.is_connection_fatal() => {
                        // The bad frame was already consumed, so the
                        // stream stays aligned; drop the command.
                        tracing::warn!(%e, "read_loop: dropping undecodable command");
                    }
                    Err(e) => {
                        // A framing error desynchronizes the stream;
                        // nothing after it can be trusted.
                        tracing::error!(%e, "read_loop: protocol error, closing");
                        self.fail_and_close();
                        return Err(ClientError::Protocol(e));
                    }
                }
            }
        };

        self.fail_and_close();
        result
    }

    /// Tears the connection down from the read loop: transitions through
    /// Closing to Closed and fails every pending request.
    fn fail_and_close(&self) {
        self.dispatcher.mark_closing();
        self.dispatcher.fail_all();
        self.dispatcher.mark_closed();
    }

    /// Routes one inbound command: correlated responses go to their
    /// waiter, unsolicited commands to the push channel or keepalive
    /// handling.
    async fn dispatch(&self, header: CommandHeader, payload: Bytes) -> Result<(), ClientError> {
        if let Some(request_id) = header.request_id {
            tracing::debug!(request_id, kind = ?header.kind, "read_loop: dispatching response");
            if !self.dispatcher.complete(request_id, header, payload) {
                tracing::warn!(request_id, "read_loop: no pending request, dropping response");
            }
            return Ok(());
        }

        match header.kind {
            CommandType::Ping => {
                tracing::debug!("read_loop: PING, answering PONG");
                self.write_frame(&CommandHeader::new(CommandType::Pong), Bytes::new())
                    .await?;
            }
            CommandType::Pong => {
                tracing::debug!("read_loop: PONG");
            }
            CommandType::Message => match serde_json::from_value::<MessageParams>(header.params) {
                Ok(params) => {
                    let event = PushEvent::Message {
                        consumer_id: params.consumer_id,
                        message_id: params.message_id,
                        partition_key: params.partition_key,
                        properties: params.properties,
                        publish_time: params.publish_time,
                        payload,
                    };
                    // No receivers is fine; deliveries are dropped then.
                    let _ = self.push_events.send(event);
                }
                Err(e) => {
                    tracing::warn!(%e, "read_loop: dropping MESSAGE with bad params");
                }
            },
            CommandType::CloseProducer => {
                match serde_json::from_value::<petrel_protocol::CloseProducerParams>(header.params)
                {
                    Ok(params) => {
                        let _ = self.push_events.send(PushEvent::ProducerClosed {
                            producer_id: params.producer_id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(%e, "read_loop: dropping CLOSE_PRODUCER with bad params");
                    }
                }
            }
            CommandType::CloseConsumer => {
                match serde_json::from_value::<petrel_protocol::CloseConsumerParams>(header.params)
                {
                    Ok(params) => {
                        let _ = self.push_events.send(PushEvent::ConsumerClosed {
                            consumer_id: params.consumer_id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(%e, "read_loop: dropping CLOSE_CONSUMER with bad params");
                    }
                }
            }
            other => {
                tracing::warn!(kind = ?other, "read_loop: unsolicited command without request id");
            }
        }
        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// Closes the connection. Pending requests are failed.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");

        self.dispatcher.mark_closing();

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        // The reader will see EOF once the writer is shut down.
        let _ = self.reader.lock().await.take();

        self.dispatcher.fail_all();
        self.dispatcher.mark_closed();

        tracing::debug!("Connection closed");
        Ok(())
    }

    /// Returns the number of in-flight requests.
    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }
}

fn server_error(header: &CommandHeader) -> ClientError {
    match serde_json::from_value::<ErrorParams>(header.params.clone()) {
        Ok(err) => ClientError::ServerError {
            code: err.code,
            message: err.message,
            retryable: err.retryable,
        },
        Err(e) => ClientError::Json(e),
    }
}
