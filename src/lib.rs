//! # mvcore
//!
//! **mvcore** is the request-dispatch core of a small MVC framework: it
//! takes one request (method + path), selects the first matching route,
//! runs the global and per-route middleware around the route's handler,
//! and turns control-flow signals into a response.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **[`container`]** - ordered key/value store with lazy singleton factories
//! - **[`registry`]** - named handler constructors and middleware
//! - **[`resolver`]** - turns a class name into a [`Handler`], container first
//! - **[`executable`]** - a deferred `class::action` target with parameters
//! - **[`router`]** - URL patterns with `:name` tokens, conditions and
//!   first-match-wins selection, plus the routes-file loader
//! - **[`middleware`]** - onion composition around a terminal handler
//! - **[`app`]** - the lifecycle: `boot()`, `execute()`, `send_response()`,
//!   hooks and service providers
//! - **[`http`]** - the request and response collaborators
//! - **[`config`]**, **[`runtime_config`]** - configuration files and paths
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Core
//!     participant Router
//!     participant Global as Global middleware
//!     participant Route as Route chain
//!     participant Resolver
//!
//!     Caller->>Core: boot()
//!     Core->>Core: before.boot, config, services, after.boot
//!     Caller->>Core: execute()
//!     Core->>Core: before.routing
//!     Core->>Router: route(uri, method)
//!     Router-->>Core: RouteMatch | none
//!     Core->>Global: wrap layers, then executables in order
//!     Global->>Route: route middleware (first is outermost)
//!     Route->>Resolver: resolve(class)
//!     Resolver-->>Route: Handler
//!     Route->>Route: handler.call(action, params)
//!     Core->>Core: after.routing
//!     Caller->>Core: send_response()
//!     Core->>Core: after.response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use mvcore::{controller, Core, DispatchError, Request, Response};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Articles;
//!
//! #[controller]
//! impl Articles {
//!     fn show(&self, inv: &mvcore::Invocation<'_>, year: u16, slug: String) -> Result<(), DispatchError> {
//!         let response = inv.service::<Response>("response")?;
//!         response.set_body(format!("{year}/{slug}"));
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = Core::new(std::env::temp_dir().join("mvcore-quickstart"));
//! app.registry().register::<Articles>("Articles");
//! app.routes(|router| {
//!     router
//!         .get("article/:year/:slug", "Articles", "show")?
//!         .where_named("year", "numeric")?;
//!     Ok(())
//! });
//! app.set_request(Request::new("GET", "/article/2024/my-post")?);
//! app.set_response_sink(Box::new(std::io::sink()));
//! app.boot()?.execute()?.send_response()?;
//!
//! let response: Arc<Response> = app.container().get("response")?;
//! assert_eq!(response.body(), "2024/my-post");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Registration problems are [`ConfigError`]s and reach the caller. Inside
//! the dispatch chain everything is a [`DispatchError`]; `execute()` turns
//! those into responses and never returns them.
//!
//! ## Logging
//!
//! The crate emits `tracing` events with structured fields. Install a
//! subscriber with [`logging::init_logging`] or bring your own.

extern crate self as mvcore;

pub mod app;
pub mod config;
pub mod container;
pub mod error;
pub mod executable;
pub mod http;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod params;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod runtime_config;

pub use app::{Core, Failure, FailureKind, Hook, Hooks, ServiceProvider, VERSION};
pub use config::Config;
pub use container::Container;
pub use error::{ConfigError, ContainerError, CoreError, DispatchError, DispatchResult, RequestError};
pub use executable::Executable;
pub use http::{Request, Response};
pub use ids::DispatchId;
pub use middleware::{Middleware, Next, TracingMiddleware};
pub use mvcore_macros::controller;
pub use params::Params;
pub use registry::Registry;
pub use resolver::{bind_handler, ActionOutput, ContainerAware, Handler, HandlerRef, Invocation, Resolver};
pub use router::{Preset, Route, RouteMatch, Router};
