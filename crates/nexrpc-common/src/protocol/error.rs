use thiserror::Error;

use super::responses::StatusCode;

/// Coarse classification of an [`RpcError`].
///
/// Callers that only care about *why* an invocation failed (to decide whether
/// to retry at a higher level, for example) match on this tag instead of on
/// the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The peer violated the wire protocol (bad magic, unknown codes, oversized frame)
    Protocol,
    /// No endpoint advertises the requested service
    ServiceNotFound,
    /// The requested method does not exist on the bound service
    MethodNotFound,
    /// A serializer plugin failed to encode or decode a value
    Serialization,
    /// Connection could not be established or was lost
    Connection,
    /// No response arrived within the configured call timeout
    Timeout,
    /// The delivered response does not belong to the request
    ResponseMismatch,
    /// The remote side answered with a non-success status
    Invocation,
    /// A request or response failed local validation
    InvalidMessage,
    /// The directory backend failed
    Registry,
    /// Raw I/O failure
    Io,
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Bincode serialization error: {0}")]
    BincodeSerialization(#[from] bincode::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Postcard serialization error: {0}")]
    PostcardSerialization(#[from] postcard::Error),

    #[error("Serializer not found for code {0}")]
    SerializerNotFound(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Response does not match request: expected {expected}, got {actual}")]
    ResponseMismatch { expected: String, actual: String },

    #[error("Invocation failed ({status}): {message}")]
    Invocation { status: StatusCode, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Returns the error-kind tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Protocol(_) => ErrorKind::Protocol,
            RpcError::ServiceNotFound(_) => ErrorKind::ServiceNotFound,
            RpcError::MethodNotFound(_) => ErrorKind::MethodNotFound,
            RpcError::BincodeSerialization(_)
            | RpcError::JsonSerialization(_)
            | RpcError::PostcardSerialization(_)
            | RpcError::SerializerNotFound(_) => ErrorKind::Serialization,
            RpcError::Connection(_) => ErrorKind::Connection,
            RpcError::Timeout(_) => ErrorKind::Timeout,
            RpcError::ResponseMismatch { .. } => ErrorKind::ResponseMismatch,
            RpcError::Invocation { .. } => ErrorKind::Invocation,
            RpcError::InvalidRequest(_) | RpcError::InvalidResponse(_) => ErrorKind::InvalidMessage,
            RpcError::Registry(_) => ErrorKind::Registry,
            RpcError::Io(_) => ErrorKind::Io,
        }
    }

    /// True for failures of the transport itself (connection loss, timeout, raw I/O).
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Io
        )
    }
}

impl From<std::net::AddrParseError> for RpcError {
    fn from(err: std::net::AddrParseError) -> Self {
        RpcError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
