use nexrpc_common::service::Invoker;
use nexrpc_common::transport::Serializer;
use nexrpc_common::{Argument, Request, Result, RpcError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

use crate::client::RpcClient;

/// Blocking façade over [`RpcClient`].
///
/// Implements [`Invoker`], so it plugs into the client stubs generated by
/// `rpc_service!`. Each call is run on the client's runtime while the calling
/// thread blocks until the response, a failure or the call timeout.
///
/// Must not be used from inside an async task; call it from a plain thread
/// or from `tokio::task::spawn_blocking`.
///
/// # Example
///
/// ```rust,no_run
/// use nexrpc_client::{ClientConfig, ClientProxy, RpcClient};
/// use nexrpc_discovery::StaticRegistry;
/// use std::sync::Arc;
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let registry = Arc::new(StaticRegistry::single("127.0.0.1:9000".parse().unwrap()));
/// let client = Arc::new(RpcClient::new(ClientConfig::default(), registry));
/// let proxy = ClientProxy::new(client, runtime.handle().clone());
/// // HelloServiceClient::new(proxy).hello(...)
/// ```
#[derive(Clone)]
pub struct ClientProxy {
    client: Arc<RpcClient>,
    runtime: Handle,
}

impl ClientProxy {
    pub fn new(client: Arc<RpcClient>, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    /// Creates a proxy bound to the runtime of the current context.
    ///
    /// # Errors
    ///
    /// Fails when called outside a Tokio runtime.
    pub fn current(client: Arc<RpcClient>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| RpcError::Connection(format!("No Tokio runtime available: {}", e)))?;
        Ok(Self::new(client, runtime))
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

impl Invoker for ClientProxy {
    fn serializer(&self) -> Serializer {
        self.client.config().serializer
    }

    fn invoke(&self, service: &str, method: &str, args: Vec<Argument>) -> Result<Vec<u8>> {
        let request = Request::new(service, method, args);
        debug!(request_id = %request.request_id, service, method, "Invoking through proxy");

        let client = self.client.clone();
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(client.call(request).await);
        });

        rx.blocking_recv()
            .map_err(|_| RpcError::Connection("Invocation task was dropped".to_string()))?
    }
}

impl std::fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProxy")
            .field("serializer", &self.client.config().serializer)
            .finish()
    }
}
