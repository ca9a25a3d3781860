use nexrpc_common::{Endpoint, Result, RpcError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::load_balancer::{LoadBalancePolicy, LoadBalancer};
use crate::registry::RegistryBackend;

/// Resolves service names to a single endpoint per call.
///
/// The directory queries its [`RegistryBackend`] on every lookup and hands
/// the current endpoint list to its load balancer. The balancer's state is
/// private to this directory and guarded by a mutex, so a directory can be
/// shared freely between threads.
pub struct ServiceDirectory {
    backend: Arc<dyn RegistryBackend>,
    balancer: Mutex<Box<dyn LoadBalancer>>,
}

impl ServiceDirectory {
    /// Creates a directory using one of the built-in policies.
    pub fn new(backend: Arc<dyn RegistryBackend>, policy: LoadBalancePolicy) -> Self {
        Self::with_balancer(backend, policy.build())
    }

    /// Creates a directory with a custom load balancer.
    pub fn with_balancer(backend: Arc<dyn RegistryBackend>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            backend,
            balancer: Mutex::new(balancer),
        }
    }

    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }

    /// Picks an endpoint serving `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ServiceNotFound`] when no endpoint advertises the
    /// service; backend failures are propagated unchanged.
    pub async fn lookup(&self, service: &str) -> Result<Endpoint> {
        let endpoints = self.backend.query(service).await?;
        if endpoints.is_empty() {
            warn!(service, "No endpoint advertises service");
            return Err(RpcError::ServiceNotFound(service.to_string()));
        }

        let endpoint = self
            .balancer
            .lock()
            .select(&endpoints)
            .cloned()
            .ok_or_else(|| RpcError::ServiceNotFound(service.to_string()))?;

        debug!(service, %endpoint, candidates = endpoints.len(), "Resolved service");
        Ok(endpoint)
    }

    pub async fn register(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        self.backend.register(service, endpoint).await
    }

    pub async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        self.backend.deregister(service, endpoint).await
    }
}
