//! # Middleware
//!
//! Middleware composes an onion around a terminal unit. Each layer receives
//! a [`Next`] continuation and chooses whether, when and how many times to
//! invoke it, which gives before/after logic, short-circuiting and retries
//! with one mechanism.
//!
//! The same trait is used at two levels:
//!
//! - on a [`Route`](crate::router::Route), wrapping the route's executable;
//! - on the [`Core`](crate::app::Core) via `Core::wrap`, wrapping the whole
//!   global middleware stack together with the matched route's chain.
//!
//! ```rust
//! use mvcore::middleware::Next;
//! use mvcore::{DispatchError, Resolver};
//!
//! // Refuse everything unless the container says maintenance is off.
//! let gate = |resolver: &Resolver, next: Next<'_>| {
//!     if resolver.app().has("maintenance") {
//!         return Err(DispatchError::Stop);
//!     }
//!     next()
//! };
//! # let _ = gate;
//! ```

mod core;
mod tracing;

pub use self::core::{run_chain, Middleware, Next};
pub use self::tracing::TracingMiddleware;
