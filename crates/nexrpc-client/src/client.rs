use nexrpc_common::transport::{Serializer, SerializerRegistry};
use nexrpc_common::{check_response, Argument, Request, Response, Result, RpcError};
use nexrpc_discovery::{LoadBalancePolicy, RegistryBackend, ServiceDirectory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connection::{ConnectionConfig, ConnectionManager};
use crate::pending::PendingCalls;

/// Client configuration.
///
/// # Default Configuration
///
/// - `serializer`: bincode (code 0)
/// - `call_timeout`: 10 seconds
/// - `load_balancer`: random
/// - `connection`: see [`ConnectionConfig`]
///
/// # Example
///
/// ```rust
/// use nexrpc_client::ClientConfig;
/// use nexrpc_common::transport::Serializer;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     serializer: Serializer::Json,
///     call_timeout: Duration::from_secs(2),
///     ..ClientConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Payload plugin used for every request this client sends
    pub serializer: Serializer,
    /// Upper bound on waiting for a response
    pub call_timeout: Duration,
    /// Endpoint selection policy
    pub load_balancer: LoadBalancePolicy,
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            serializer: Serializer::Bincode,
            call_timeout: Duration::from_secs(10),
            load_balancer: LoadBalancePolicy::Random,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Asynchronous NexRPC client.
///
/// Resolves the target service through its [`ServiceDirectory`], reuses one
/// multiplexed connection per endpoint and correlates responses by request
/// id, so many calls can be in flight over one socket at once.
pub struct RpcClient {
    config: ClientConfig,
    directory: ServiceDirectory,
    connections: ConnectionManager,
    pending: Arc<PendingCalls>,
}

impl RpcClient {
    /// Creates a client resolving services through `backend`.
    pub fn new(config: ClientConfig, backend: Arc<dyn RegistryBackend>) -> Self {
        let directory = ServiceDirectory::new(backend, config.load_balancer);
        Self::with_directory(config, directory)
    }

    /// Creates a client around an existing directory.
    pub fn with_directory(config: ClientConfig, directory: ServiceDirectory) -> Self {
        let pending = Arc::new(PendingCalls::new());
        let connections = ConnectionManager::with_registry(
            config.connection.clone(),
            pending.clone(),
            Arc::new(SerializerRegistry::new()),
        );

        Self {
            config,
            directory,
            connections,
            pending,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn pending(&self) -> &Arc<PendingCalls> {
        &self.pending
    }

    /// Sends `request` and waits for its correlated response.
    ///
    /// The returned response has not been checked; see [`call`](Self::call).
    ///
    /// # Errors
    ///
    /// - [`RpcError::ServiceNotFound`] if no endpoint serves the interface
    /// - [`RpcError::Connection`] if the connection fails or is lost
    /// - [`RpcError::Timeout`] if no response arrives within `call_timeout`
    pub async fn send_request(&self, request: &Request) -> Result<Response> {
        let endpoint = self.directory.lookup(&request.interface_name).await?;
        let connection = self.connections.get(&endpoint, self.config.serializer).await?;

        let handle = self
            .pending
            .register(request.request_id.clone(), connection.id())?;
        // dropped on every exit, including cancellation of this future
        let _guard = self.pending.guard(request.request_id.clone());
        connection.send(request.clone())?;

        debug!(
            request_id = %request.request_id,
            interface = %request.interface_name,
            method = %request.method_name,
            %endpoint,
            "Request sent"
        );

        match tokio::time::timeout(self.config.call_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Connection(format!(
                "Call {} was dropped before completion",
                request.request_id
            ))),
            Err(_) => {
                let timeout_ms = self.config.call_timeout.as_millis() as u64;
                warn!(
                    request_id = %request.request_id,
                    interface = %request.interface_name,
                    method = %request.method_name,
                    timeout_ms,
                    "Call timed out"
                );
                Err(RpcError::Timeout(timeout_ms))
            }
        }
    }

    /// Sends `request` and returns the encoded return value.
    pub async fn call(&self, request: Request) -> Result<Vec<u8>> {
        let response = self.send_request(&request).await?;
        into_data(&request, response)
    }

    /// Builds and sends a request for `service::method`.
    pub async fn invoke(&self, service: &str, method: &str, args: Vec<Argument>) -> Result<Vec<u8>> {
        self.call(Request::new(service, method, args)).await
    }

    /// Closes every connection; in-flight calls fail.
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
    }
}

/// Validates a delivered response and extracts its payload.
fn into_data(request: &Request, response: Response) -> Result<Vec<u8>> {
    check_response(request, &response)?;
    response.data.ok_or_else(|| {
        RpcError::InvalidResponse("Missing data in success response".to_string())
    })
}
