//! Implementations of the demo services.

use nexrpc_common::Result;
use tracing::info;

use crate::{ByeService, HelloObject, HelloService};

/// Reply returned by [`HelloServiceImpl`] for every call.
pub const HELLO_REPLY: &str = "This is Impl1 method";

#[derive(Debug, Default, Clone, Copy)]
pub struct HelloServiceImpl;

impl HelloService for HelloServiceImpl {
    fn hello(&self, object: HelloObject) -> Result<String> {
        info!(id = object.id, message = %object.message, "hello received");
        Ok(HELLO_REPLY.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ByeServiceImpl;

impl ByeService for ByeServiceImpl {
    fn bye(&self, name: String) -> Result<String> {
        Ok(format!("bye, {}", name))
    }
}
