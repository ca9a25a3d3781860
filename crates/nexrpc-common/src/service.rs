//! Service definitions and method-call interception.
//!
//! A service is declared once with [`rpc_service!`](crate::rpc_service),
//! which generates three items:
//!
//! - the service trait, implemented by the real service on the server;
//! - a client stub implementing the same trait by forwarding each call to
//!   an [`Invoker`] (for example the blocking client proxy);
//! - a server adapter implementing [`ServiceHandler`], which the server
//!   dispatcher uses to look up and invoke methods by name and declared
//!   parameter types.
//!
//! # Example
//!
//! ```
//! use nexrpc_common::rpc_service;
//! use nexrpc_common::service::ServiceHandler;
//!
//! rpc_service! {
//!     /// Adds numbers.
//!     service Calculator {
//!         name = "demo.Calculator";
//!         client = CalculatorClient;
//!         server = CalculatorServer;
//!
//!         fn add(&self, a: i64, b: i64) -> i64;
//!     }
//! }
//!
//! struct Adder;
//!
//! impl Calculator for Adder {
//!     fn add(&self, a: i64, b: i64) -> nexrpc_common::Result<i64> {
//!         Ok(a + b)
//!     }
//! }
//!
//! let handler = CalculatorServer::new(Adder);
//! assert_eq!(handler.service_name(), "demo.Calculator");
//! assert_eq!(handler.methods()[0].param_types, vec!["i64", "i64"]);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::protocol::error::{Result, RpcError};
use crate::protocol::Argument;
use crate::transport::Serializer;

/// Name and declared parameter types of one service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub param_types: Vec<&'static str>,
}

impl MethodDescriptor {
    pub fn new(name: &'static str, param_types: Vec<&'static str>) -> Self {
        Self { name, param_types }
    }

    /// True if this method is the overload named `name` taking `param_types`.
    pub fn matches(&self, name: &str, param_types: &[String]) -> bool {
        self.name == name
            && self.param_types.len() == param_types.len()
            && self
                .param_types
                .iter()
                .zip(param_types)
                .all(|(declared, given)| *declared == given.as_str())
    }
}

/// Encoded call arguments handed to a [`ServiceHandler`].
///
/// Values are decoded in declaration order with the serializer the request
/// frame arrived with.
#[derive(Debug)]
pub struct Arguments<'a> {
    serializer: Serializer,
    values: &'a [Vec<u8>],
    position: usize,
}

impl<'a> Arguments<'a> {
    pub fn new(serializer: Serializer, values: &'a [Vec<u8>]) -> Self {
        Self {
            serializer,
            values,
            position: 0,
        }
    }

    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes the next argument as `T`.
    pub fn next_value<T: DeserializeOwned>(&mut self) -> Result<T> {
        let raw = self.values.get(self.position).ok_or_else(|| {
            RpcError::InvalidRequest(format!("Missing argument at position {}", self.position))
        })?;
        self.position += 1;
        self.serializer.deserialize(raw)
    }

    /// Encodes a method's return value for the response.
    pub fn encode_return<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        self.serializer.serialize(value)
    }
}

/// Server side of a service: a method table plus name-based invocation.
pub trait ServiceHandler: Send + Sync + 'static {
    /// Name the service is published under by default.
    fn service_name(&self) -> &str;

    /// Every invocable method with its declared parameter types.
    fn methods(&self) -> Vec<MethodDescriptor>;

    /// Invokes `method`, returning the encoded return value.
    fn call(&self, method: &str, args: Arguments<'_>) -> Result<Vec<u8>>;

    /// Finds the overload matching a request's method name and parameter types.
    fn find_method(&self, name: &str, param_types: &[String]) -> Option<MethodDescriptor> {
        self.methods()
            .into_iter()
            .find(|m| m.matches(name, param_types))
    }
}

/// Client side of a service: ships one method call to wherever the
/// implementation lives and returns the encoded return value.
pub trait Invoker: Send + Sync {
    /// The plugin used to encode arguments and decode the return value.
    fn serializer(&self) -> Serializer;

    fn invoke(&self, service: &str, method: &str, args: Vec<Argument>) -> Result<Vec<u8>>;
}

impl<I: Invoker + ?Sized> Invoker for Arc<I> {
    fn serializer(&self) -> Serializer {
        (**self).serializer()
    }

    fn invoke(&self, service: &str, method: &str, args: Vec<Argument>) -> Result<Vec<u8>> {
        (**self).invoke(service, method, args)
    }
}

/// Declares a service trait together with its client stub and server adapter.
///
/// Every method takes `&self` and returns `Result<T>`, where `T` and every
/// parameter type must be serde-serializable. See the [module
/// docs](crate::service) for an example.
#[macro_export]
macro_rules! rpc_service {
    (
        $(#[$attr:meta])*
        service $trait_name:ident {
            name = $service_name:literal;
            client = $client:ident;
            server = $server:ident;
            $(
                $(#[$method_attr:meta])*
                fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$attr])*
        pub trait $trait_name: Send + Sync + 'static {
            $(
                $(#[$method_attr])*
                fn $method(&self $(, $arg: $arg_ty)*) -> $crate::protocol::Result<$ret>;
            )*
        }

        #[doc = concat!("Client stub for `", $service_name, "`.")]
        #[derive(Debug, Clone)]
        pub struct $client<I> {
            invoker: I,
        }

        impl<I: $crate::service::Invoker + 'static> $client<I> {
            pub const SERVICE_NAME: &'static str = $service_name;

            pub fn new(invoker: I) -> Self {
                Self { invoker }
            }

            pub fn invoker(&self) -> &I {
                &self.invoker
            }
        }

        impl<I: $crate::service::Invoker + 'static> $trait_name for $client<I> {
            $(
                fn $method(&self $(, $arg: $arg_ty)*) -> $crate::protocol::Result<$ret> {
                    let serializer = $crate::service::Invoker::serializer(&self.invoker);
                    let args = vec![
                        $($crate::protocol::Argument::encode::<$arg_ty>(serializer, &$arg)?),*
                    ];
                    let data = $crate::service::Invoker::invoke(
                        &self.invoker,
                        $service_name,
                        stringify!($method),
                        args,
                    )?;
                    serializer.deserialize::<$ret>(&data)
                }
            )*
        }

        #[doc = concat!("Server adapter publishing a `", stringify!($trait_name), "` implementation.")]
        pub struct $server<T> {
            inner: ::std::sync::Arc<T>,
        }

        impl<T: $trait_name> $server<T> {
            pub const SERVICE_NAME: &'static str = $service_name;

            pub fn new(service: T) -> Self {
                Self {
                    inner: ::std::sync::Arc::new(service),
                }
            }

            pub fn from_arc(inner: ::std::sync::Arc<T>) -> Self {
                Self { inner }
            }
        }

        impl<T: $trait_name> $crate::service::ServiceHandler for $server<T> {
            fn service_name(&self) -> &str {
                $service_name
            }

            fn methods(&self) -> Vec<$crate::service::MethodDescriptor> {
                vec![
                    $($crate::service::MethodDescriptor::new(
                        stringify!($method),
                        vec![$(::std::any::type_name::<$arg_ty>()),*],
                    )),*
                ]
            }

            #[allow(unused_mut)]
            fn call(
                &self,
                method: &str,
                mut args: $crate::service::Arguments<'_>,
            ) -> $crate::protocol::Result<Vec<u8>> {
                match method {
                    $(
                        stringify!($method) => {
                            $(let $arg: $arg_ty = args.next_value()?;)*
                            let ret: $ret = self.inner.$method($($arg),*)?;
                            args.encode_return(&ret)
                        }
                    )*
                    other => Err($crate::protocol::RpcError::MethodNotFound(format!(
                        "{}#{}",
                        $service_name, other
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorKind, Request};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Point {
        x: i32,
        y: i32,
    }

    crate::rpc_service! {
        /// Test geometry service.
        service Geometry {
            name = "test.Geometry";
            client = GeometryClient;
            server = GeometryServer;

            fn translate(&self, point: Point, dx: i32, dy: i32) -> Point;
            fn origin(&self) -> Point;
            fn fail(&self, reason: String) -> ();
        }
    }

    struct Plane;

    impl Geometry for Plane {
        fn translate(&self, point: Point, dx: i32, dy: i32) -> crate::Result<Point> {
            Ok(Point {
                x: point.x + dx,
                y: point.y + dy,
            })
        }

        fn origin(&self) -> crate::Result<Point> {
            Ok(Point { x: 0, y: 0 })
        }

        fn fail(&self, reason: String) -> crate::Result<()> {
            Err(RpcError::InvalidRequest(reason))
        }
    }

    /// Invokes a handler in-process, going through the same request shape
    /// the network path uses.
    struct LocalInvoker<H> {
        handler: H,
        serializer: Serializer,
    }

    impl<H: ServiceHandler> Invoker for LocalInvoker<H> {
        fn serializer(&self) -> Serializer {
            self.serializer
        }

        fn invoke(&self, service: &str, method: &str, args: Vec<Argument>) -> Result<Vec<u8>> {
            let request = Request::new(service, method, args);
            assert_eq!(service, self.handler.service_name());
            self.handler
                .find_method(&request.method_name, &request.param_types)
                .ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;
            self.handler
                .call(method, Arguments::new(self.serializer, &request.parameters))
        }
    }

    fn local_client(serializer: Serializer) -> GeometryClient<LocalInvoker<GeometryServer<Plane>>> {
        GeometryClient::new(LocalInvoker {
            handler: GeometryServer::new(Plane),
            serializer,
        })
    }

    #[test]
    fn test_method_table() {
        let server = GeometryServer::new(Plane);
        let methods = server.methods();

        assert_eq!(methods.len(), 3);
        assert_eq!(methods[0].name, "translate");
        assert_eq!(methods[0].param_types.len(), 3);
        assert!(methods[0].param_types[0].ends_with("Point"));
        assert_eq!(methods[0].param_types[1], "i32");
        assert!(methods[1].param_types.is_empty());
    }

    #[test]
    fn test_find_method_by_signature() {
        let server = GeometryServer::new(Plane);
        let types = vec![std::any::type_name::<String>().to_string()];
        let wrong = vec!["i32".to_string()];

        assert!(server.find_method("origin", &[]).is_some());
        assert!(server.find_method("fail", &types).is_some());
        assert!(server.find_method("fail", &wrong).is_none());
        assert!(server.find_method("fail", &[]).is_none());
        assert!(server.find_method("missing", &[]).is_none());
    }

    #[test]
    fn test_client_stub_round_trip_every_serializer() {
        for serializer in Serializer::ALL {
            let client = local_client(serializer);
            let moved = client.translate(Point { x: 1, y: 2 }, 10, -5).unwrap();
            assert_eq!(moved, Point { x: 11, y: -3 });
            assert_eq!(client.origin().unwrap(), Point { x: 0, y: 0 });
        }
    }

    #[test]
    fn test_service_error_propagates() {
        let client = local_client(Serializer::Json);
        let err = client.fail("nope".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMessage);
    }

    #[test]
    fn test_unknown_method_on_adapter() {
        let server = GeometryServer::new(Plane);
        let err = server
            .call("rotate", Arguments::new(Serializer::Json, &[]))
            .unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
    }

    #[test]
    fn test_missing_argument_is_rejected() {
        let server = GeometryServer::new(Plane);
        let err = server
            .call("translate", Arguments::new(Serializer::Json, &[]))
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest(_)));
    }

    #[test]
    fn test_service_name_constant() {
        assert_eq!(
            GeometryClient::<LocalInvoker<GeometryServer<Plane>>>::SERVICE_NAME,
            "test.Geometry"
        );
        assert_eq!(GeometryServer::<Plane>::SERVICE_NAME, "test.Geometry");
    }
}
