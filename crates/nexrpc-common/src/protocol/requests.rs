use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Result, RpcError};
use crate::transport::serializer::Serializer;

/// Opaque, unique request token (a v4 UUID rendered as a string).
pub type RequestId = String;

/// Type descriptor carried alongside each parameter value.
pub type TypeName = String;

/// A single encoded call argument with its static type descriptor.
///
/// The value is encoded with the same serializer plugin as the frame that
/// carries the request, so the receiving side can decode it once it knows
/// the concrete target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub type_name: TypeName,
    pub value: Vec<u8>,
}

impl Argument {
    /// Encodes `value` with `serializer`, recording `T` as the declared type.
    pub fn encode<T: Serialize>(serializer: Serializer, value: &T) -> Result<Self> {
        Ok(Self {
            type_name: std::any::type_name::<T>().to_string(),
            value: serializer.serialize(value)?,
        })
    }
}

/// An RPC request sent from a client proxy to the server owning the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub request_id: RequestId,
    pub interface_name: String,
    pub method_name: String,
    pub parameters: Vec<Vec<u8>>,
    pub param_types: Vec<TypeName>,
    pub heartbeat: bool,
}

impl Request {
    /// Creates a request with a fresh request id.
    pub fn new(
        interface_name: impl Into<String>,
        method_name: impl Into<String>,
        arguments: Vec<Argument>,
    ) -> Self {
        let (param_types, parameters) = arguments
            .into_iter()
            .map(|arg| (arg.type_name, arg.value))
            .unzip();

        Request {
            request_id: generate_request_id(),
            interface_name: interface_name.into(),
            method_name: method_name.into(),
            parameters,
            param_types,
            heartbeat: false,
        }
    }

    /// Creates a payload-less heartbeat request.
    pub fn heartbeat() -> Self {
        Request {
            request_id: generate_request_id(),
            interface_name: String::new(),
            method_name: String::new(),
            parameters: Vec::new(),
            param_types: Vec::new(),
            heartbeat: true,
        }
    }

    /// Checks that every parameter value has a matching type descriptor.
    ///
    /// Heartbeats carry no call semantics and always pass.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat {
            return Ok(());
        }
        if self.parameters.len() != self.param_types.len() {
            return Err(RpcError::InvalidRequest(format!(
                "{} parameter values but {} parameter types for {}#{}",
                self.parameters.len(),
                self.param_types.len(),
                self.interface_name,
                self.method_name
            )));
        }
        Ok(())
    }
}

fn generate_request_id() -> RequestId {
    Uuid::new_v4().to_string()
}
