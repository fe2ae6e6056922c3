//! Handler class registry.
//!
//! Maps class names to constructors so the [`Resolver`](crate::resolver::Resolver)
//! can instantiate handlers that are not bound in the container, and maps
//! middleware names to shared middleware so declarative routes files can
//! attach them by name.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::DispatchResult;
use crate::middleware::Middleware;
use crate::resolver::{FnHandler, Handler, Invocation};

/// Zero-argument constructor producing a fresh handler instance.
pub type Constructor = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

/// Name → constructor table for handler classes, plus named middleware.
#[derive(Default)]
pub struct Registry {
    classes: RwLock<HashMap<String, Constructor>>,
    middleware: RwLock<HashMap<String, Arc<dyn Middleware>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `H` under `name`, constructed through `Default`.
    pub fn register<H>(&self, name: &str)
    where
        H: Handler + Default + 'static,
    {
        self.register_with(name, || Box::new(H::default()) as Box<dyn Handler>);
    }

    /// Register an arbitrary constructor under `name`.
    ///
    /// Registering the same name twice replaces the earlier constructor.
    pub fn register_with<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    {
        let previous = self
            .classes
            .write()
            .insert(name.to_string(), Arc::new(constructor));
        if previous.is_some() {
            warn!(class = %name, "Replaced existing handler class");
        } else {
            info!(class = %name, "Handler class registered");
        }
    }

    /// Register a closure as a handler class. The closure receives every
    /// action invoked on the class and can branch on
    /// [`Invocation::action`].
    pub fn register_fn<F>(&self, name: &str, f: F)
    where
        F: Fn(&Invocation<'_>) -> DispatchResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.register_with(name, move || {
            Box::new(FnHandler::new(Arc::clone(&f))) as Box<dyn Handler>
        });
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Build a fresh instance of the class registered under `name`.
    #[must_use]
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Handler>> {
        let constructor = self.classes.read().get(name).cloned()?;
        Some(constructor())
    }

    /// Register a named middleware usable from routes files.
    pub fn register_middleware(&self, name: &str, middleware: impl Middleware + 'static) {
        self.middleware
            .write()
            .insert(name.to_string(), Arc::new(middleware));
    }

    #[must_use]
    pub fn middleware(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.middleware.read().get(name).cloned()
    }

    /// Registered class names, sorted.
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut middleware: Vec<String> = self.middleware.read().keys().cloned().collect();
        middleware.sort();
        f.debug_struct("Registry")
            .field("classes", &self.class_names())
            .field("middleware", &middleware)
            .finish()
    }
}
