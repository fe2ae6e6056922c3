//! Error taxonomy for registration, boot and dispatch.
//!
//! Three families exist and they never mix:
//!
//! - [`ConfigError`] is raised while the application is being assembled
//!   (routes, hooks, middleware, config files). It reaches the caller
//!   directly and is not recoverable by the framework.
//! - [`DispatchError`] travels through the handler chain during
//!   [`Core::execute`](crate::app::Core::execute). `Stop` and `NotFound` are
//!   control-flow signals, everything else becomes an internal error. None
//!   of them escape `execute()`.
//! - [`CoreError`] is returned by the lifecycle entry points themselves
//!   (`boot`, `execute`, `send_response`).

use std::fmt;

/// Result type returned by every unit of the dispatch chain.
pub type DispatchResult = Result<(), DispatchError>;

/// Failures of the service container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// No binding exists under the requested key.
    #[error("no binding registered under `{0}`")]
    UnknownBinding(String),
    /// A binding exists but holds a value of another type.
    #[error("binding `{key}` does not hold a `{expected}`")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
    /// A lazy factory failed while producing its value.
    #[error("factory for `{key}` failed: {source}")]
    Factory {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Control-flow signals and failures raised inside the dispatch chain.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Deliberate early termination. The response is left as it is.
    #[error("dispatch stopped")]
    Stop,
    /// Nothing can serve the request. Carries an optional response body.
    #[error("{}", .0.as_deref().unwrap_or(NOT_FOUND_BODY))]
    NotFound(Option<String>),
    /// A class or service name could not be turned into a handler.
    #[error("cannot resolve `{name}`: {reason}")]
    Resolution { name: String, reason: String },
    /// The resolved handler does not expose the requested action.
    #[error("`{class}` has no action `{action}`")]
    UnknownAction { class: String, action: String },
    /// A declared action input has no value in the parameter map.
    #[error("missing parameter `{name}`")]
    MissingParam { name: String },
    /// A declared action input could not be parsed into its type.
    #[error("invalid value `{value}` for parameter `{name}`: {reason}")]
    InvalidParam {
        name: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Default body written when a request cannot be routed.
pub const NOT_FOUND_BODY: &str =
    "<h1>404 Not Found</h1>The page that you have requested could not be found.";

impl DispatchError {
    /// Not-found signal with the default body.
    #[must_use]
    pub fn not_found() -> Self {
        DispatchError::NotFound(None)
    }

    /// Not-found signal carrying its own body.
    #[must_use]
    pub fn not_found_with(message: impl Into<String>) -> Self {
        DispatchError::NotFound(Some(message.into()))
    }

    /// Wrap any displayable message as an internal failure.
    #[must_use]
    pub fn internal(message: impl fmt::Display) -> Self {
        DispatchError::Internal(anyhow::anyhow!("{message}"))
    }

    /// `true` for the silent early-exit signal.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, DispatchError::Stop)
    }

    /// `true` for the routine not-found condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound(_))
    }
}

/// Errors detected while assembling the application, before any request
/// is served.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Class or action names must be non-empty identifiers.
    #[error("invalid {what} name `{name}`: expected a non-empty identifier")]
    InvalidTarget { what: &'static str, name: String },
    #[error("unknown condition preset `{0}`")]
    UnknownPreset(String),
    #[error("invalid condition for parameter `{param}`: {source}")]
    InvalidCondition {
        param: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
    /// Every route must accept at least one method.
    #[error("route `{0}` accepts no HTTP method")]
    NoMethods(String),
    #[error("unknown hook `{0}`")]
    UnknownHook(String),
    #[error("no middleware registered under `{0}`")]
    UnknownMiddleware(String),
    /// A configuration or routes file exists but cannot be read or parsed.
    #[error("cannot load `{path}`: {source}")]
    File {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A request cannot be built from the given environment.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("HTTP request must have an associated `{0}`")]
    Missing(&'static str),
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
}

/// Errors returned by the application lifecycle entry points.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("application is not booted")]
    NotBooted,
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A service provider or a boot hook failed.
    #[error("boot failed: {0}")]
    Boot(#[source] anyhow::Error),
    /// The response could not be produced or flushed.
    #[error("response could not be sent: {0}")]
    Response(#[source] anyhow::Error),
}

/// Check that `name` can be used as a class or action identifier.
///
/// Accepts ASCII letters, digits, `_`, `-`, `.`, `:` and `\` so that plain
/// names (`ArticleController`) and namespaced ones (`App\Articles`,
/// `app::articles`) are valid.
pub(crate) fn validate_target(what: &'static str, name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '\\' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidTarget {
            what,
            name: name.to_string(),
        })
    }
}
