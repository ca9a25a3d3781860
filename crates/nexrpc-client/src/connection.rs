use futures::{SinkExt, StreamExt};
use nexrpc_common::transport::{
    sleep_until_idle, Frame, FrameCodec, IdleConfig, IdleEvent, LivenessSupervisor, Message,
    Serializer, SerializerRegistry, DEFAULT_WRITE_IDLE, MAX_FRAME_LEN,
};
use nexrpc_common::{Endpoint, Request, Result, RpcError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::pending::{ConnectionId, PendingCalls};

type ConnectionKey = (Endpoint, u32);
/// Holds the live connection for one key. Locked across connection setup so
/// only callers of that key wait on it.
type ConnectionSlot = Arc<Mutex<Option<Connection>>>;
type ConnectionTable = Arc<parking_lot::Mutex<HashMap<ConnectionKey, ConnectionSlot>>>;

/// Client connection configuration.
///
/// # Default Configuration
///
/// - `connect_timeout`: 5 seconds
/// - `write_idle`: 5 seconds (a heartbeat is sent after this long without writes)
/// - `max_frame_len`: 100 MB
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on TCP connection establishment
    pub connect_timeout: Duration,
    /// Write-idle threshold before a heartbeat is sent; `None` disables heartbeats
    pub write_idle: Option<Duration>,
    /// Largest frame payload accepted or sent
    pub max_frame_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_idle: Some(DEFAULT_WRITE_IDLE),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

struct ConnectionInner {
    id: ConnectionId,
    endpoint: Endpoint,
    serializer: Serializer,
    outbound: mpsc::UnboundedSender<Frame>,
    active: AtomicBool,
    shutdown: CancellationToken,
}

/// Handle to a multiplexed connection.
///
/// Cheap to clone; every clone writes to the same socket. The socket itself
/// is driven by a background task that writes queued frames, routes
/// responses to the pending-call table and sends heartbeats when idle.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn serializer(&self) -> Serializer {
        self.inner.serializer
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Queues a request for writing.
    pub fn send(&self, request: Request) -> Result<()> {
        if !self.is_active() {
            return Err(RpcError::Connection(format!(
                "Connection to {} is closed",
                self.inner.endpoint
            )));
        }
        self.inner
            .outbound
            .send(Frame::request(self.inner.serializer, request))
            .map_err(|_| {
                RpcError::Connection(format!("Connection to {} is closed", self.inner.endpoint))
            })
    }

    /// Tears the connection down; in-flight calls on it fail.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .field("serializer", &self.inner.serializer)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Owns one connection per (endpoint, serializer) pair.
///
/// # Architecture
///
/// - Connections are keyed by endpoint and serializer code
/// - A live connection is reused by every caller
/// - Establishing a connection blocks only callers of the same key
/// - A connection whose task exits (peer closed, protocol violation, local
///   close) marks itself inactive, removes its own table entry and fails the
///   calls registered against it; the next `get` reconnects
pub struct ConnectionManager {
    config: ConnectionConfig,
    codec: FrameCodec,
    pending: Arc<PendingCalls>,
    connections: ConnectionTable,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, pending: Arc<PendingCalls>) -> Self {
        Self::with_registry(config, pending, Arc::new(SerializerRegistry::new()))
    }

    pub fn with_registry(
        config: ConnectionConfig,
        pending: Arc<PendingCalls>,
        registry: Arc<SerializerRegistry>,
    ) -> Self {
        let codec = FrameCodec::with_registry(registry).max_frame_len(config.max_frame_len);
        Self {
            config,
            codec,
            pending,
            connections: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the live connection to `endpoint` for `serializer`,
    /// establishing one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connection`] if the connection cannot be
    /// established within the configured connect timeout.
    pub async fn get(&self, endpoint: &Endpoint, serializer: Serializer) -> Result<Connection> {
        let slot = self.slot((endpoint.clone(), serializer.code()));
        let mut slot = slot.lock().await;

        if let Some(connection) = slot.as_ref() {
            if connection.is_active() {
                return Ok(connection.clone());
            }
            debug!(%endpoint, connection_id = connection.id(), "Evicting inactive connection");
            *slot = None;
        }

        let connection = self.connect(endpoint, serializer).await?;
        *slot = Some(connection.clone());
        Ok(connection)
    }

    fn slot(&self, key: ConnectionKey) -> ConnectionSlot {
        self.connections.lock().entry(key).or_default().clone()
    }

    async fn connect(&self, endpoint: &Endpoint, serializer: Serializer) -> Result<Connection> {
        let addr = (endpoint.host.as_str(), endpoint.port);
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                RpcError::Connection(format!(
                    "Timed out connecting to {} after {}ms",
                    endpoint,
                    self.config.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| RpcError::Connection(format!("Failed to connect to {}: {}", endpoint, e)))?;
        stream.set_nodelay(true)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let connection = Connection {
            inner: Arc::new(ConnectionInner {
                id,
                endpoint: endpoint.clone(),
                serializer,
                outbound,
                active: AtomicBool::new(true),
                shutdown: CancellationToken::new(),
            }),
        };

        let idle = IdleConfig {
            read_idle: None,
            write_idle: self.config.write_idle,
        };
        tokio::spawn(drive_connection(
            stream,
            outbound_rx,
            connection.clone(),
            self.codec.clone(),
            idle,
            self.pending.clone(),
            self.connections.clone(),
        ));

        info!(%endpoint, connection_id = id, %serializer, "Connection established");
        Ok(connection)
    }

    /// Number of cached connections.
    pub async fn connection_count(&self) -> usize {
        let slots: Vec<ConnectionSlot> = self.connections.lock().values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Closes every cached connection.
    pub async fn close_all(&self) {
        let slots: Vec<ConnectionSlot> = self.connections.lock().drain().map(|(_, s)| s).collect();
        for slot in slots {
            if let Some(connection) = slot.lock().await.take() {
                connection.close();
            }
        }
    }
}

async fn drive_connection(
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    connection: Connection,
    codec: FrameCodec,
    idle: IdleConfig,
    pending: Arc<PendingCalls>,
    connections: ConnectionTable,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, codec.clone());
    let mut writer = FramedWrite::new(write_half, codec);
    let mut liveness = LivenessSupervisor::new(idle);
    let endpoint = connection.endpoint().clone();
    let serializer = connection.serializer();

    let reason = loop {
        let deadline = liveness.next_deadline();

        tokio::select! {
            _ = connection.inner.shutdown.cancelled() => break "closed locally".to_string(),

            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.send(frame).await {
                        break format!("write failed: {}", e);
                    }
                    liveness.record_write();
                }
                None => break "all handles dropped".to_string(),
            },

            inbound = reader.next() => match inbound {
                Some(Ok(frame)) => {
                    liveness.record_read();
                    match frame.message {
                        Message::Response(response) => {
                            let request_id = response.request_id.clone();
                            pending.complete(&request_id, response);
                        }
                        Message::Request(request) if request.heartbeat => {
                            debug!(%endpoint, "Received heartbeat");
                        }
                        Message::Request(request) => {
                            warn!(%endpoint, request_id = %request.request_id, "Ignoring request sent to client");
                        }
                    }
                }
                Some(Err(e)) => {
                    error!(%endpoint, error = %e, "Protocol error, closing connection");
                    break e.to_string();
                }
                None => break "closed by peer".to_string(),
            },

            _ = sleep_until_idle(deadline) => match liveness.poll_idle(Instant::now()) {
                Some(IdleEvent::WriterIdle) => {
                    debug!(%endpoint, "Write idle, sending heartbeat");
                    if let Err(e) = writer.send(Frame::request(serializer, Request::heartbeat())).await {
                        break format!("heartbeat failed: {}", e);
                    }
                    liveness.record_write();
                }
                Some(IdleEvent::ReaderIdle) => {
                    warn!(%endpoint, "Read idle, closing connection");
                    break "read idle".to_string();
                }
                None => {}
            },
        }
    };

    connection.inner.active.store(false, Ordering::Release);
    // requests queued after this point fail at send
    drop(outbound);

    let slot = connections
        .lock()
        .get(&(endpoint.clone(), serializer.code()))
        .cloned();
    if let Some(slot) = slot {
        let mut slot = slot.lock().await;
        if slot.as_ref().map(|c| c.id()) == Some(connection.id()) {
            *slot = None;
        }
    }

    let failed = pending.fail_connection(connection.id(), || {
        RpcError::Connection(format!("Connection to {} lost: {}", endpoint, reason))
    });
    info!(%endpoint, connection_id = connection.id(), failed_calls = failed, reason = %reason, "Connection closed");
}
