//! # Application Core
//!
//! [`Core`] ties the container, the resolver and the router into one
//! request lifecycle:
//!
//! 1. [`Core::boot`] runs `before.boot`, loads the configuration file, binds
//!    `config`, `request`, `response` and `router`, registers every
//!    [`ServiceProvider`] in order, then runs `after.boot`.
//! 2. [`Core::execute`] loads the routes once, runs `before.routing`, matches
//!    the request, runs the global middleware stack followed by the matched
//!    route's chain, then runs `after.routing`.
//! 3. [`Core::send_response`] flushes the response and runs
//!    `after.response`.
//!
//! ## Failure handling
//!
//! Inside `execute()` a [`DispatchError::Stop`](crate::error::DispatchError::Stop)
//! ends the dispatch without touching the response. Not-found conditions
//! bind a [`Failure`] under `not.found` and run the `not.found` hook, any
//! other error binds one under `exception` and runs `internal.error`. With
//! no hook attached (or when the hook itself fails) a default 404 or 500
//! body is written instead.
//!
//! When no route matches, the `not.found` hook runs inside routing and its
//! outcome carries on: `Ok` lets the global stack and `after.routing` run,
//! a stop ends the dispatch, and any other error goes to `internal.error`.
//!
//! The dispatch span carries an id taken from a valid `X-Request-Id`
//! request header, or a fresh ULID.
//!
//! ## Hooks
//!
//! | key | runs |
//! |---|---|
//! | `before.boot` | first thing in `boot()` |
//! | `after.boot` | after all service providers |
//! | `before.routing` | before the request is matched |
//! | `after.routing` | after the route chain completed |
//! | `after.response` | after the response was flushed |
//! | `not.found` | when no route matches or a handler signals not-found |
//! | `internal.error` | when dispatch fails for any other reason |

mod core;
mod hooks;
mod provider;

pub use self::core::{Core, Failure, FailureKind, EXCEPTION_KEY, NOT_FOUND_KEY, REQUEST_ID_HEADER, VERSION};
pub use self::hooks::{Hook, Hooks};
pub use self::provider::ServiceProvider;
