//! Deferred, resolver-driven invocation of a `class` + `action` target.
//!
//! An [`Executable`] is a template: it names its target and carries the
//! parameters given at registration time. Every run works on a freshly
//! built parameter set, so matched route values from one request never
//! leak into the next one.

use std::time::Instant;
use tracing::{debug, info};

use crate::error::{validate_target, ConfigError, DispatchError, DispatchResult};
use crate::params::Params;
use crate::resolver::{Invocation, Resolver};

#[derive(Debug, Clone)]
pub struct Executable {
    class: String,
    action: String,
    params: Params,
    resolver: Option<Resolver>,
}

impl Executable {
    /// Create an executable targeting `class::action`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTarget`] when either name is not an identifier.
    pub fn new(class: &str, action: &str) -> Result<Self, ConfigError> {
        validate_target("class", class)?;
        validate_target("action", action)?;
        Ok(Self {
            class: class.to_string(),
            action: action.to_string(),
            params: Params::new(),
            resolver: None,
        })
    }

    /// Create an executable with construction-time parameters.
    ///
    /// # Errors
    ///
    /// As [`Executable::new`].
    pub fn with_params<I, K, V>(class: &str, action: &str, params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<std::sync::Arc<str>>,
        V: Into<String>,
    {
        let mut exe = Self::new(class, action)?;
        exe.params = params.into_iter().collect();
        Ok(exe)
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replace the parameter map wholesale.
    pub fn set_params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Merge `params` into the stored map: incoming keys overwrite,
    /// untouched keys stay.
    pub fn add_params(&mut self, params: &Params) -> &mut Self {
        self.params.merge(params);
        self
    }

    /// Bind the resolver used by [`Executable::invoke`].
    pub fn set_resolver(&mut self, resolver: Resolver) -> &mut Self {
        self.resolver = Some(resolver);
        self
    }

    /// Run with the resolver bound through [`Executable::set_resolver`].
    ///
    /// # Errors
    ///
    /// [`DispatchError::Internal`] when no resolver is bound, otherwise
    /// whatever [`Executable::execute`] returns.
    pub fn invoke(&self) -> DispatchResult {
        match &self.resolver {
            Some(resolver) => self.execute(resolver),
            None => Err(DispatchError::internal(format_args!(
                "no resolver bound for {}::{}",
                self.class, self.action
            ))),
        }
    }

    /// Resolve the target class and run the action with the stored
    /// parameters.
    ///
    /// # Errors
    ///
    /// Resolution failures and anything the action returns.
    pub fn execute(&self, resolver: &Resolver) -> DispatchResult {
        self.execute_with(resolver, &Params::new())
    }

    /// Like [`Executable::execute`], with `extra` merged over the stored
    /// parameters for this run only. Values in `extra` win on conflicts.
    ///
    /// # Errors
    ///
    /// Resolution failures and anything the action returns.
    pub fn execute_with(&self, resolver: &Resolver, extra: &Params) -> DispatchResult {
        let mut params = self.params.clone();
        for (name, value) in extra.iter() {
            if let Some(previous) = params.insert(name, value) {
                if previous != value {
                    debug!(
                        class = %self.class,
                        action = %self.action,
                        param = %name,
                        "Matched value overrides registered parameter"
                    );
                }
            }
        }

        debug!(
            class = %self.class,
            action = %self.action,
            params = ?params,
            "Executable invocation start"
        );
        let start = Instant::now();

        let handler = resolver.resolve(&self.class)?;
        let invocation = Invocation::new(&self.class, &self.action, &params, resolver);
        let result = handler.call(&invocation);

        info!(
            class = %self.class,
            action = %self.action,
            duration_us = start.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "Executable invocation complete"
        );
        result
    }
}
