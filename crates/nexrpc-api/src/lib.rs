//! NexRPC demo API
//!
//! Service definitions shared by the demo server and its callers. Both sides
//! depend on this crate, so the method tables the server publishes and the
//! stubs the client calls through are generated from the same declaration.

use nexrpc_common::rpc_service;
use serde::{Deserialize, Serialize};

pub mod demo;

/// Argument of [`HelloService::hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloObject {
    pub id: i32,
    pub message: String,
}

impl HelloObject {
    pub fn new(id: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

rpc_service! {
    /// Greets the caller with a message derived from a [`HelloObject`].
    service HelloService {
        name = "nexrpc.api.HelloService";
        client = HelloServiceClient;
        server = HelloServiceServer;

        fn hello(&self, object: HelloObject) -> String;
    }
}

rpc_service! {
    service ByeService {
        name = "nexrpc.api.ByeService";
        client = ByeServiceClient;
        server = ByeServiceServer;

        fn bye(&self, name: String) -> String;
    }
}
