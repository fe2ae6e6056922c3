//! # Router Module
//!
//! Pattern routing: URL templates with named, constrained parameters,
//! matched first-come-first-served against the request URI and method.
//!
//! ## Patterns
//!
//! A pattern mixes literal text with `:name` tokens, e.g.
//! `article/:year/:slug`. Leading and trailing `/` are ignored on both
//! the pattern and the URI, and one trailing `/` is tolerated on the URI.
//! Literal text matches itself exactly.
//!
//! Each token becomes a capture using, in priority order:
//!
//! 1. a raw fragment set with [`Route::where_regex`];
//! 2. a [`Preset`] set with [`Route::where_preset`] or [`Route::where_named`];
//! 3. the `default` preset (`unicode` when [`Route::match_unicode`] is on).
//!
//! Captured values are URL-decoded.
//!
//! ## Selection
//!
//! [`Router::route`] evaluates routes in registration order and returns the
//! first that matches as an immutable [`RouteMatch`]. Overlapping patterns
//! are disambiguated by registration order only.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use mvcore::router::{Preset, Router};
//!
//! # fn main() -> Result<(), mvcore::ConfigError> {
//! let mut router = Router::new();
//! router
//!     .get("article/:year/:slug", "Articles", "show")?
//!     .where_preset("year", Preset::Numeric);
//!
//! let m = router.route("article/2024/my-post", &Method::GET).unwrap();
//! assert_eq!(m.param("year"), Some("2024"));
//! assert_eq!(m.param("slug"), Some("my-post"));
//! assert!(router.route("article/abcd/my-post", &Method::GET).is_none());
//! # Ok(())
//! # }
//! ```

mod core;
pub mod loader;
mod route;

pub use self::core::{RouteMatch, Router, ANY_METHODS};
pub use self::loader::{load_routes, RouteDecl};
pub use self::route::{token_names, Preset, Route};
