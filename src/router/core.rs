//! Router core: ordered route table and first-match selection.

use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::route::Route;
use crate::error::{ConfigError, DispatchResult};
use crate::params::Params;
use crate::resolver::Resolver;

/// Methods registered by [`Router::any`].
pub const ANY_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// Result of successfully matching a request to a route.
///
/// Immutable: the route is shared, the parameters belong to this match
/// only.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Registration index of the matched route.
    pub index: usize,
    pub route: Arc<Route>,
    /// Decoded token values in pattern order.
    pub params: Params,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Run the matched route's chain with this match's parameters.
    ///
    /// # Errors
    ///
    /// Whatever the route chain returns.
    pub fn dispatch(&self, resolver: &Resolver) -> DispatchResult {
        self.route.dispatch(resolver, &self.params)
    }
}

/// Ordered collection of routes. Registration order is match priority.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `route` and return it for further configuration.
    pub fn add(&mut self, route: Route) -> &mut Route {
        info!(
            route_pattern = %route.pattern(),
            methods = ?route.methods(),
            class = %route.executable().class(),
            action = %route.executable().action(),
            "Route registered"
        );
        self.routes.push(Arc::new(route));
        let last = self.routes.len() - 1;
        Arc::make_mut(&mut self.routes[last])
    }

    /// Register `pattern` for `method`, dispatching to `class::action`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTarget`] for invalid class or action names.
    pub fn register(&mut self, pattern: &str, method: Method, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        Ok(self.add(Route::new(pattern, method, class, action)?))
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn get(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        self.register(pattern, Method::GET, class, action)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn post(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        self.register(pattern, Method::POST, class, action)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn put(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        self.register(pattern, Method::PUT, class, action)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn patch(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        self.register(pattern, Method::PATCH, class, action)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn delete(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        self.register(pattern, Method::DELETE, class, action)
    }

    /// Register `pattern` for every method in [`ANY_METHODS`].
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn any(&mut self, pattern: &str, class: &str, action: &str) -> Result<&mut Route, ConfigError> {
        let route = self.get(pattern, class, action)?;
        route.set_methods(ANY_METHODS)
    }

    /// Select the first registered route matching `uri` and `method`.
    #[must_use]
    pub fn route(&self, uri: &str, method: &Method) -> Option<RouteMatch> {
        debug!(method = %method, uri = %uri, routes_count = self.routes.len(), "Route match attempt");
        let start = Instant::now();

        let found = self
            .routes
            .iter()
            .enumerate()
            .find_map(|(index, route)| route.match_request(uri, method).map(|params| (index, route, params)));

        let elapsed = start.elapsed();
        match found {
            Some((index, route, params)) => {
                if elapsed > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        uri = %uri,
                        route_pattern = %route.pattern(),
                        duration_us = elapsed.as_micros() as u64,
                        "Slow route matching detected"
                    );
                } else {
                    info!(
                        method = %method,
                        uri = %uri,
                        route_pattern = %route.pattern(),
                        params = ?params,
                        duration_us = elapsed.as_micros() as u64,
                        "Route matched"
                    );
                }
                Some(RouteMatch {
                    index,
                    route: Arc::clone(route),
                    params,
                })
            }
            None => {
                warn!(
                    method = %method,
                    uri = %uri,
                    duration_us = elapsed.as_micros() as u64,
                    "No route matched"
                );
                None
            }
        }
    }

    /// Run a previously selected route.
    ///
    /// # Errors
    ///
    /// Whatever the route chain returns.
    pub fn dispatch(&self, matched: &RouteMatch, resolver: &Resolver) -> DispatchResult {
        matched.dispatch(resolver)
    }

    /// Compile every route's expression so broken conditions surface
    /// before the first request.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError::InvalidCondition`] encountered.
    pub fn compile_all(&self) -> Result<(), ConfigError> {
        for route in &self.routes {
            route.compiled()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
