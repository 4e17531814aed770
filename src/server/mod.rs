//! may_minihttp transport glue.
//!
//! [`JoltService`] turns each inbound request into a dispatcher
//! [`Request`](crate::dispatcher::Request), runs it through the
//! [`Application`](crate::dispatcher::Application) and writes the resulting
//! response back. [`HttpServer`] starts the listener.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{build_request, parse_query_params, parse_request, BodyLimits, RequestError};
pub use response::{status_reason, write_response};
pub use service::JoltService;
