//! # Service Container
//!
//! The container is the foundation every other component sits on: an
//! ordered registry of named services where each binding is either an
//! eagerly supplied value or a factory evaluated on first access.
//!
//! ## Singletons by first access
//!
//! ```rust
//! use mvcore::container::Container;
//!
//! let app = Container::new();
//! app.set("greeting", String::from("hello"));
//! app.singleton("shout", |c| {
//!     let greeting = c.get::<String>("greeting")?;
//!     Ok(greeting.to_uppercase())
//! });
//!
//! let a = app.get::<String>("shout").unwrap();
//! let b = app.get::<String>("shout").unwrap();
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! ```
//!
//! ## Keys used by the application core
//!
//! | key        | type                                   |
//! |------------|----------------------------------------|
//! | `config`   | [`Config`](crate::config::Config)       |
//! | `request`  | [`Request`](crate::http::Request)       |
//! | `response` | [`Response`](crate::http::Response)     |
//! | `router`   | `parking_lot::RwLock<Router>`          |
//! | `not.found`| [`Failure`](crate::app::Failure) bound before the not-found hook runs |
//! | `exception`| [`Failure`](crate::app::Failure) bound before the internal-error hook runs |

mod core;

pub use self::core::{Container, Factory, Service};
