//! NexRPC Response Types
//!
//! This module defines the RPC response structure and its status codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, RpcError};
use super::requests::{Request, RequestId};

/// Numeric status code carried by a successful response.
pub const SUCCESS_CODE: u16 = 200;
/// Numeric status code shared by every failure status.
pub const FAILURE_CODE: u16 = 500;

/// Outcome of an invocation as reported by the server.
///
/// On the wire only two numbers exist (200 and 500); the three failure
/// statuses share 500 and are told apart by the leading message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    Fail,
    MethodNotFound,
    ClassNotFound,
}

impl StatusCode {
    /// Numeric wire code.
    pub fn code(&self) -> u16 {
        match self {
            StatusCode::Success => SUCCESS_CODE,
            StatusCode::Fail | StatusCode::MethodNotFound | StatusCode::ClassNotFound => {
                FAILURE_CODE
            }
        }
    }

    /// Canonical message text, used as the prefix of `Response::message`.
    pub fn message(&self) -> &'static str {
        match self {
            StatusCode::Success => "method invoked successfully",
            StatusCode::Fail => "method invocation failed",
            StatusCode::MethodNotFound => "method not found",
            StatusCode::ClassNotFound => "class not found",
        }
    }

    /// Recovers the status from a wire code and message.
    ///
    /// Unknown failure messages fall back to [`StatusCode::Fail`].
    pub fn from_wire(code: u16, message: &str) -> Self {
        if code == SUCCESS_CODE {
            return StatusCode::Success;
        }
        if message.starts_with(StatusCode::MethodNotFound.message()) {
            StatusCode::MethodNotFound
        } else if message.starts_with(StatusCode::ClassNotFound.message()) {
            StatusCode::ClassNotFound
        } else {
            StatusCode::Fail
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// An RPC response returned from a server to the client.
///
/// # Fields
///
/// - `request_id`: echoes the id of the request that triggered it
/// - `status_code`: 200 on success, 500 otherwise
/// - `message`: human-readable diagnostic, prefixed by the status message
/// - `data`: encoded return value, present only on success
///
/// # Example
///
/// ```
/// use nexrpc_common::protocol::{Response, StatusCode};
///
/// let ok = Response::success("id-1".to_string(), vec![1, 2, 3]);
/// assert_eq!(ok.status(), StatusCode::Success);
///
/// let missing = Response::fail("id-1".to_string(), StatusCode::MethodNotFound, "greet");
/// assert_eq!(missing.status(), StatusCode::MethodNotFound);
/// assert!(missing.data.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub request_id: RequestId,
    pub status_code: u16,
    pub message: String,
    pub data: Option<Vec<u8>>,
}

impl Response {
    /// Creates a successful response carrying an encoded return value.
    pub fn success(request_id: RequestId, data: Vec<u8>) -> Self {
        Response {
            request_id,
            status_code: SUCCESS_CODE,
            message: StatusCode::Success.message().to_string(),
            data: Some(data),
        }
    }

    /// Creates a failure response.
    ///
    /// `detail` is appended to the canonical status message; pass an empty
    /// string to send the bare status message.
    pub fn fail(request_id: RequestId, status: StatusCode, detail: impl AsRef<str>) -> Self {
        let detail = detail.as_ref();
        let message = if detail.is_empty() {
            status.message().to_string()
        } else {
            format!("{}: {}", status.message(), detail)
        };

        Response {
            request_id,
            status_code: status.code(),
            message,
            data: None,
        }
    }

    /// The decoded status of this response.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_wire(self.status_code, &self.message)
    }

    pub fn is_success(&self) -> bool {
        self.status() == StatusCode::Success
    }
}

/// Validates a delivered response against the request it is meant to answer.
///
/// A request id mismatch is always a hard error: it means the correlation
/// table handed this caller someone else's response. Any non-success status
/// becomes an [`RpcError::Invocation`] carrying the server's message.
pub fn check_response(request: &Request, response: &Response) -> Result<()> {
    if request.request_id != response.request_id {
        tracing::error!(
            interface = %request.interface_name,
            expected = %request.request_id,
            actual = %response.request_id,
            "Response does not match request"
        );
        return Err(RpcError::ResponseMismatch {
            expected: request.request_id.clone(),
            actual: response.request_id.clone(),
        });
    }

    let status = response.status();
    if status != StatusCode::Success {
        tracing::warn!(
            interface = %request.interface_name,
            method = %request.method_name,
            message = %response.message,
            "Remote invocation failed"
        );
        return Err(RpcError::Invocation {
            status,
            message: response.message.clone(),
        });
    }

    Ok(())
}
