pub mod endpoint;
pub mod error;
pub mod requests;
pub mod responses;


pub use endpoint::Endpoint;
pub use error::{ErrorKind, Result, RpcError};
pub use requests::{Argument, Request, RequestId, TypeName};
pub use responses::{check_response, Response, StatusCode, FAILURE_CODE, SUCCESS_CODE};
