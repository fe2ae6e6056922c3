//! # Resolver
//!
//! Turns a class or service name into a callable [`Handler`].
//!
//! Resolution order:
//!
//! 1. A binding in the [`Container`] under the name wins. The container's
//!    singleton semantics apply, so a bound name never yields two instances.
//! 2. Otherwise the [`Registry`] constructs a fresh instance, trying the
//!    name as given and then with the namespace prefix in front.
//! 3. If the fresh instance reports the [`ContainerAware`] capability, the
//!    resolver's container is injected before it is returned.
//!
//! Handlers bound in the container must be stored as a [`HandlerRef`]
//! (see [`bind_handler`]).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::container::Container;
use crate::error::{ContainerError, DispatchError, DispatchResult};
use crate::params::Params;
use crate::registry::Registry;

/// A resolvable target: something with named actions.
///
/// Implement it by hand with a `match` on [`Invocation::action`], or let
/// `#[controller]` generate it from an inherent `impl` block.
pub trait Handler: Send + Sync {
    /// Run the action named by `invocation.action()`.
    ///
    /// Outputs are written to services in the container (typically the
    /// response); the dispatch chain only looks at the control-flow result.
    fn call(&self, invocation: &Invocation<'_>) -> DispatchResult;

    /// Capability query for container injection. Return `Some(self)` from
    /// types that implement [`ContainerAware`].
    fn container_aware(&mut self) -> Option<&mut dyn ContainerAware> {
        None
    }
}

/// Capability of handlers that want the application container injected
/// when the resolver instantiates them.
pub trait ContainerAware {
    fn set_app(&mut self, app: Arc<Container>);
}

/// Shared handler as stored in the container.
pub type HandlerRef = Arc<dyn Handler>;

/// Bind `handler` in `app` under `key` so that resolving `key` returns this
/// very instance.
pub fn bind_handler<H: Handler + 'static>(app: &Container, key: impl Into<String>, handler: H) {
    app.set(key, Arc::new(handler) as HandlerRef);
}

/// Everything an action sees when it runs.
pub struct Invocation<'a> {
    class: &'a str,
    action: &'a str,
    params: &'a Params,
    resolver: &'a Resolver,
}

impl<'a> Invocation<'a> {
    #[must_use]
    pub fn new(class: &'a str, action: &'a str, params: &'a Params, resolver: &'a Resolver) -> Self {
        Self {
            class,
            action,
            params,
            resolver,
        }
    }

    #[must_use]
    pub fn class(&self) -> &'a str {
        self.class
    }

    #[must_use]
    pub fn action(&self) -> &'a str {
        self.action
    }

    #[must_use]
    pub fn params(&self) -> &'a Params {
        self.params
    }

    #[must_use]
    pub fn resolver(&self) -> &'a Resolver {
        self.resolver
    }

    #[must_use]
    pub fn app(&self) -> &'a Container {
        self.resolver.app()
    }

    /// Typed access to a required parameter.
    ///
    /// # Errors
    ///
    /// See [`Params::parse`].
    pub fn param<T>(&self, name: &str) -> Result<T, DispatchError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.params.parse(name)
    }

    /// Typed access to an optional parameter.
    ///
    /// # Errors
    ///
    /// See [`Params::parse_opt`].
    pub fn param_opt<T>(&self, name: &str) -> Result<Option<T>, DispatchError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.params.parse_opt(name)
    }

    /// Fetch a typed service from the container.
    ///
    /// # Errors
    ///
    /// Container lookup failures, wrapped as [`DispatchError::Container`].
    pub fn service<T: std::any::Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, DispatchError> {
        Ok(self.app().get::<T>(key)?)
    }

    /// The error to return for an action this handler does not know.
    #[must_use]
    pub fn unknown_action(&self) -> DispatchError {
        DispatchError::UnknownAction {
            class: self.class.to_string(),
            action: self.action.to_string(),
        }
    }
}

/// Adapter that lets a closure act as a handler class.
pub struct FnHandler<F> {
    f: Arc<F>,
}

impl<F> FnHandler<F> {
    pub fn new(f: Arc<F>) -> Self {
        Self { f }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Invocation<'_>) -> DispatchResult + Send + Sync,
{
    fn call(&self, invocation: &Invocation<'_>) -> DispatchResult {
        (self.f)(invocation)
    }
}

/// Conversion of action return values into a chain result. Lets actions
/// return `()` or any `Result<(), E>` whose error converts into
/// [`DispatchError`].
pub trait ActionOutput {
    fn into_dispatch_result(self) -> DispatchResult;
}

impl ActionOutput for () {
    fn into_dispatch_result(self) -> DispatchResult {
        Ok(())
    }
}

impl<E: Into<DispatchError>> ActionOutput for Result<(), E> {
    fn into_dispatch_result(self) -> DispatchResult {
        self.map_err(Into::into)
    }
}

/// Facade over the container and the class registry.
#[derive(Clone)]
pub struct Resolver {
    app: Arc<Container>,
    registry: Arc<Registry>,
    namespace_prefix: String,
}

impl Resolver {
    #[must_use]
    pub fn new(app: Arc<Container>, registry: Arc<Registry>) -> Self {
        Self {
            app,
            registry,
            namespace_prefix: String::new(),
        }
    }

    /// Prefix tried in front of class names the registry does not know
    /// verbatim, e.g. `App\Controllers\`.
    pub fn set_namespace_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.namespace_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    #[must_use]
    pub fn app(&self) -> &Container {
        &self.app
    }

    /// The shared container handle, for injection into container-aware
    /// handlers.
    #[must_use]
    pub fn app_handle(&self) -> Arc<Container> {
        Arc::clone(&self.app)
    }

    /// Point the resolver at another container.
    pub fn set_app(&mut self, app: Arc<Container>) -> &mut Self {
        self.app = app;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve `name` into a handler.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Resolution`] when the name is neither bound in the
    /// container (as a [`HandlerRef`]) nor registered as a class, or when
    /// the bound value cannot be produced.
    pub fn resolve(&self, name: &str) -> Result<HandlerRef, DispatchError> {
        if self.app.has(name) {
            trace!(name = %name, "Resolving from container");
            return match self.app.get::<HandlerRef>(name) {
                Ok(bound) => Ok(Arc::clone(&*bound)),
                Err(ContainerError::TypeMismatch { .. }) => Err(DispatchError::Resolution {
                    name: name.to_string(),
                    reason: "container binding is not a handler".to_string(),
                }),
                Err(e) => Err(DispatchError::Resolution {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            };
        }

        let mut instance = self
            .registry
            .instantiate(name)
            .or_else(|| {
                if self.namespace_prefix.is_empty() {
                    return None;
                }
                self.registry.instantiate(&format!("{}{name}", self.namespace_prefix))
            })
            .ok_or_else(|| DispatchError::Resolution {
                name: name.to_string(),
                reason: "no such class registered".to_string(),
            })?;

        if let Some(aware) = instance.container_aware() {
            debug!(class = %name, "Injecting container into handler");
            aware.set_app(Arc::clone(&self.app));
        }

        Ok(Arc::from(instance))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("app", &self.app)
            .field("registry", &self.registry)
            .field("namespace_prefix", &self.namespace_prefix)
            .finish()
    }
}
