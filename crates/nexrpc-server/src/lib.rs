//! NexRPC Server
//!
//! This crate provides the server side of NexRPC: a local map of published
//! services, a dispatcher invoking methods on a bounded worker pool, and a
//! TCP server with an explicit start/stop lifecycle.

pub mod config;
pub mod dispatcher;
pub mod provider;
pub mod server;

pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use provider::ServiceProvider;
pub use server::{RpcServer, RunningServer};
