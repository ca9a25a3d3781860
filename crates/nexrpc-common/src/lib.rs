//! NexRPC Common Types and Transport
//!
//! This crate provides the core protocol definitions, wire codec and
//! service-definition machinery shared by every NexRPC component.
//!
//! # Overview
//!
//! NexRPC lets a caller invoke a method on a service interface as if it were
//! local while the implementation runs in another process. This crate holds
//! the pieces both sides agree on:
//!
//! - **Protocol Layer**: Request/Response types, status codes, endpoints and errors
//! - **Transport Layer**: frame codec, serializer plugins and liveness tracking
//! - **Service Layer**: the [`rpc_service!`] macro and the handler/invoker traits
//!
//! # Architecture
//!
//! - **Transport**: TCP, one long-lived connection per (endpoint, serializer)
//! - **Serialization**: bincode, JSON or postcard, chosen per frame
//! - **Message Format**: `[magic][kind][serializer][length]` as big-endian `u32`, then the payload
//! - **Max Frame Size**: 100 MB (prevents memory exhaustion)
//!
//! # Components
//!
//! - [`protocol`] - Core protocol types (Request, Response, RpcError)
//! - [`transport`] - Frame codec, serializer registry and idle tracking
//! - [`service`] - Service handler and invoker traits
//!
//! # Example
//!
//! ```
//! use nexrpc_common::{check_response, Argument, Request, Response};
//! use nexrpc_common::transport::Serializer;
//!
//! let arg = Argument::encode(Serializer::Bincode, &"Alice".to_string()).unwrap();
//! let request = Request::new("demo.ByeService", "bye", vec![arg]);
//!
//! let data = Serializer::Bincode.serialize(&"bye, Alice".to_string()).unwrap();
//! let response = Response::success(request.request_id.clone(), data);
//! assert!(check_response(&request, &response).is_ok());
//! ```

pub mod protocol;
pub mod service;
pub mod transport;

pub use protocol::*;
