use async_trait::async_trait;
use nexrpc_common::{Endpoint, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Contract of the naming service storing which endpoints advertise which
/// services.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Advertises `endpoint` as a provider of `service`.
    async fn register(&self, service: &str, endpoint: &Endpoint) -> Result<()>;

    /// Lists every endpoint currently advertising `service`.
    async fn query(&self, service: &str) -> Result<Vec<Endpoint>>;

    /// Withdraws a previous registration.
    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<()>;
}

/// Process-local registry backend.
///
/// Share one instance (behind an `Arc`) between servers and clients living
/// in the same process, e.g. in tests.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    services: RwLock<HashMap<String, Vec<Endpoint>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all services with at least one endpoint.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl RegistryBackend for InMemoryRegistry {
    async fn register(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        let mut services = self.services.write();
        let endpoints = services.entry(service.to_string()).or_default();
        if !endpoints.contains(endpoint) {
            endpoints.push(endpoint.clone());
            info!(service, %endpoint, "Registered service endpoint");
        }
        Ok(())
    }

    async fn query(&self, service: &str) -> Result<Vec<Endpoint>> {
        Ok(self
            .services
            .read()
            .get(service)
            .cloned()
            .unwrap_or_default())
    }

    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        let mut services = self.services.write();
        if let Some(endpoints) = services.get_mut(service) {
            endpoints.retain(|e| e != endpoint);
            if endpoints.is_empty() {
                services.remove(service);
            }
            info!(service, %endpoint, "Deregistered service endpoint");
        }
        Ok(())
    }
}

/// Registry backend answering every query with a fixed endpoint list.
///
/// Used to call a known server directly, bypassing any naming service.
/// Registrations are accepted and ignored.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    endpoints: Vec<Endpoint>,
}

impl StaticRegistry {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn single(endpoint: Endpoint) -> Self {
        Self::new(vec![endpoint])
    }
}

#[async_trait]
impl RegistryBackend for StaticRegistry {
    async fn register(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        debug!(service, %endpoint, "Static registry ignores registration");
        Ok(())
    }

    async fn query(&self, _service: &str) -> Result<Vec<Endpoint>> {
        Ok(self.endpoints.clone())
    }

    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<()> {
        debug!(service, %endpoint, "Static registry ignores deregistration");
        Ok(())
    }
}
