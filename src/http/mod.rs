//! # HTTP collaborators
//!
//! Minimal request and response objects bound in the container under
//! `request` and `response`. Routing needs only the request's method, URI
//! and query bag; the response needs a status, a body and a way to be
//! flushed.
//!
//! Both are shared behind `Arc` once bound, so the mutable parts (query
//! bag, status, headers, body) use interior locking.

mod request;
mod response;

pub use request::{Request, DEFAULT_PROTOCOL};
pub use response::{Response, Sink};
