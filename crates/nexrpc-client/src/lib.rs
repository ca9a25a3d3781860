//! NexRPC client
//!
//! - [`PendingCalls`]: request-id keyed table of in-flight calls
//! - [`ConnectionManager`]: one multiplexed connection per (endpoint, serializer)
//! - [`RpcClient`]: async core resolving, sending and correlating calls
//! - [`ClientProxy`]: blocking [`Invoker`](nexrpc_common::service::Invoker) for generated client stubs

pub mod client;
pub mod connection;
pub mod pending;
pub mod proxy;

pub use client::{ClientConfig, RpcClient};
pub use connection::{Connection, ConnectionConfig, ConnectionManager};
pub use pending::{CompletionHandle, ConnectionId, PendingCalls, PendingGuard};
pub use proxy::ClientProxy;
