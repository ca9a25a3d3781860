use futures::{SinkExt, StreamExt};
use nexrpc_common::service::ServiceHandler;
use nexrpc_common::transport::{
    sleep_until_idle, Frame, FrameCodec, IdleConfig, IdleEvent, LivenessSupervisor, Message,
    SerializerRegistry,
};
use nexrpc_common::{Endpoint, Result, RpcError};
use nexrpc_discovery::RegistryBackend;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::provider::ServiceProvider;

/// A NexRPC server before it starts listening.
///
/// Publish services first, then call [`start`](Self::start), which binds the
/// listener, registers every published service with the directory backend
/// and spawns the accept loop.
///
/// # Example
///
/// ```no_run
/// use nexrpc_discovery::InMemoryRegistry;
/// use nexrpc_server::{RpcServer, ServerConfig};
/// use std::sync::Arc;
///
/// # async fn run() -> nexrpc_common::Result<()> {
/// let server = RpcServer::new(ServerConfig::new("127.0.0.1:9000"), Arc::new(InMemoryRegistry::new()));
/// // server.publish(HelloServiceServer::new(HelloServiceImpl));
/// let running = server.start().await?;
/// running.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcServer {
    config: ServerConfig,
    provider: Arc<ServiceProvider>,
    registry: Arc<dyn RegistryBackend>,
    serializers: Arc<SerializerRegistry>,
}

impl RpcServer {
    pub fn new(config: ServerConfig, registry: Arc<dyn RegistryBackend>) -> Self {
        Self {
            config,
            provider: Arc::new(ServiceProvider::new()),
            registry,
            serializers: Arc::new(SerializerRegistry::new()),
        }
    }

    /// Restricts the payload plugins this server accepts.
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = Arc::new(serializers);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<ServiceProvider> {
        &self.provider
    }

    /// Publishes `handler` under its declared service name.
    ///
    /// Returns `false` if the name is already taken; the first binding wins.
    pub fn publish<H: ServiceHandler>(&self, handler: H) -> bool {
        let name = handler.service_name().to_string();
        self.provider.add(name, Arc::new(handler))
    }

    /// Publishes `handler` under an explicit service name.
    pub fn publish_as<H: ServiceHandler>(&self, name: impl Into<String>, handler: H) -> bool {
        self.provider.add(name, Arc::new(handler))
    }

    /// Binds the listener, registers services and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound or a registration is rejected.
    pub async fn start(self) -> Result<RunningServer> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| {
                RpcError::Connection(format!("Failed to bind to {}: {}", self.config.bind_addr, e))
            })?;
        let local_addr = listener.local_addr()?;
        let endpoint = self
            .config
            .advertise_addr
            .clone()
            .unwrap_or_else(|| Endpoint::from(local_addr));

        let services = self.provider.names();
        for service in &services {
            self.registry.register(service, &endpoint).await?;
        }

        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(self.provider.clone(), self.config.max_workers);
        let codec = FrameCodec::with_registry(self.serializers.clone())
            .max_frame_len(self.config.max_frame_len);
        let task = tokio::spawn(accept_loop(
            listener,
            dispatcher,
            codec,
            self.config.idle(),
            shutdown.clone(),
        ));

        info!(%local_addr, %endpoint, services = services.len(), "Server started");

        Ok(RunningServer {
            local_addr,
            endpoint,
            services,
            registry: self.registry,
            shutdown,
            task,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    local_addr: SocketAddr,
    endpoint: Endpoint,
    services: Vec<String>,
    registry: Arc<dyn RegistryBackend>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The endpoint registered with the directory.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Deregisters every service, then closes the listener and all connections.
    ///
    /// Connections are closed even if a deregistration fails; the first
    /// such failure is returned.
    pub async fn stop(self) -> Result<()> {
        let mut first_error = None;
        for service in &self.services {
            if let Err(e) = self.registry.deregister(service, &self.endpoint).await {
                warn!(service = %service, error = %e, "Failed to deregister service");
                first_error.get_or_insert(e);
            }
        }

        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Accept loop terminated abnormally");
        }

        info!(endpoint = %self.endpoint, "Server stopped");
        first_error.map_or(Ok(()), Err)
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    codec: FrameCodec,
    idle: IdleConfig,
    shutdown: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Connection accepted");
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        dispatcher.clone(),
                        codec.clone(),
                        idle,
                        shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    codec: FrameCodec,
    idle: IdleConfig,
    shutdown: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, codec.clone());
    let mut writer = FramedWrite::new(write_half, codec);
    let (responses, mut outbound) = mpsc::unbounded_channel::<Frame>();
    let mut liveness = LivenessSupervisor::new(idle);

    let reason = loop {
        let deadline = liveness.next_deadline();

        tokio::select! {
            _ = shutdown.cancelled() => break "server stopping".to_string(),

            inbound = reader.next() => match inbound {
                Some(Ok(frame)) => {
                    liveness.record_read();
                    let serializer = frame.serializer;
                    match frame.message {
                        Message::Request(request) if request.heartbeat => {
                            debug!(%peer, "Heartbeat received");
                        }
                        Message::Request(request) => {
                            // no further reads until a worker is free
                            let permit = tokio::select! {
                                permit = dispatcher.reserve() => permit,
                                _ = shutdown.cancelled() => break "server stopping".to_string(),
                            };
                            let Some(permit) = permit else {
                                break "worker pool closed".to_string();
                            };

                            let dispatcher = dispatcher.clone();
                            let responses = responses.clone();
                            tokio::spawn(async move {
                                if let Some(response) = dispatcher.run(permit, request, serializer).await {
                                    // the connection may be gone by now
                                    let _ = responses.send(Frame::response(serializer, response));
                                }
                            });
                        }
                        Message::Response(response) => {
                            warn!(%peer, request_id = %response.request_id, "Ignoring response sent to server");
                        }
                    }
                }
                Some(Err(e)) => {
                    error!(%peer, error = %e, "Protocol error, closing connection");
                    break e.to_string();
                }
                None => break "closed by peer".to_string(),
            },

            Some(frame) = outbound.recv() => {
                if let Err(e) = writer.send(frame).await {
                    break format!("write failed: {}", e);
                }
            },

            _ = sleep_until_idle(deadline) => {
                if let Some(IdleEvent::ReaderIdle) = liveness.poll_idle(Instant::now()) {
                    warn!(%peer, "Read idle, closing connection");
                    break "read idle".to_string();
                }
            },
        }
    };

    info!(%peer, reason = %reason, "Connection closed");
}
