use anyhow::Result;
use nexrpc_api::demo::{ByeServiceImpl, HelloServiceImpl};
use nexrpc_api::{ByeServiceServer, HelloServiceServer};
use nexrpc_common::Endpoint;
use nexrpc_discovery::{InMemoryRegistry, RegistryBackend};
use nexrpc_server::{RpcServer, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options of the `serve` subcommand.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: String,
    pub advertise: Option<Endpoint>,
    /// `None` keeps silent connections open forever
    pub read_idle: Option<Duration>,
    pub workers: usize,
}

impl ServeOptions {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.bind.clone())
            .with_read_idle(self.read_idle)
            .with_max_workers(self.workers);
        if let Some(advertise) = &self.advertise {
            config = config.with_advertise_addr(advertise.clone());
        }
        config
    }
}

/// Builds a server with the demo services published.
pub fn demo_server(options: &ServeOptions, registry: Arc<dyn RegistryBackend>) -> RpcServer {
    let server = RpcServer::new(options.server_config(), registry);
    server.publish(HelloServiceServer::new(HelloServiceImpl));
    server.publish(ByeServiceServer::new(ByeServiceImpl));
    server
}

/// Runs the demo server until Ctrl-C, then stops it.
pub async fn run_serve(options: ServeOptions) -> Result<()> {
    let registry = Arc::new(InMemoryRegistry::new());
    let running = demo_server(&options, registry).start().await?;

    info!(
        endpoint = %running.endpoint(),
        services = ?running.services(),
        "Serving demo services, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    running.stop().await?;

    Ok(())
}
