//! Server configuration.

use nexrpc_common::transport::{IdleConfig, DEFAULT_READ_IDLE, MAX_FRAME_LEN};
use nexrpc_common::Endpoint;
use std::time::Duration;

/// Configuration for an [`RpcServer`](crate::RpcServer).
///
/// # Fields
///
/// - `bind_addr` - Address to listen on (default: `127.0.0.1:9000`)
/// - `advertise_addr` - Endpoint registered with the directory; defaults to the bound address
/// - `read_idle` - Connections silent for this long are closed (default: 30 seconds)
/// - `max_workers` - Maximum concurrent method invocations (default: 16)
/// - `max_frame_len` - Largest accepted frame payload (default: 100 MB)
///
/// # Example
///
/// ```
/// use nexrpc_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("0.0.0.0:9000")
///     .with_read_idle(Some(Duration::from_secs(60)))
///     .with_max_workers(64);
/// assert_eq!(config.max_workers, 64);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub advertise_addr: Option<Endpoint>,
    pub read_idle: Option<Duration>,
    pub max_workers: usize,
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            advertise_addr: None,
            read_idle: Some(DEFAULT_READ_IDLE),
            max_workers: 16,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_advertise_addr(mut self, endpoint: Endpoint) -> Self {
        self.advertise_addr = Some(endpoint);
        self
    }

    /// Sets the read-idle threshold; `None` keeps silent connections open.
    pub fn with_read_idle(mut self, read_idle: Option<Duration>) -> Self {
        self.read_idle = read_idle;
        self
    }

    /// Sets the worker limit. Zero is raised to one.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub(crate) fn idle(&self) -> IdleConfig {
        IdleConfig {
            read_idle: self.read_idle,
            write_idle: None,
        }
    }
}
