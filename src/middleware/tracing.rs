use std::time::Instant;

use tracing::{info, info_span, warn};

use super::{Middleware, Next};
use crate::error::{DispatchError, DispatchResult};
use crate::resolver::Resolver;

/// Wraps its continuation in a span and logs latency and outcome.
pub struct TracingMiddleware {
    label: String,
}

impl TracingMiddleware {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new("route")
    }
}

fn outcome(result: &DispatchResult) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(DispatchError::Stop) => "stop",
        Err(DispatchError::NotFound(_)) => "not_found",
        Err(_) => "error",
    }
}

impl Middleware for TracingMiddleware {
    fn handle(&self, _resolver: &Resolver, next: Next<'_>) -> DispatchResult {
        let span = info_span!("middleware", label = %self.label);
        let _guard = span.enter();
        let start = Instant::now();

        let result = next();

        let latency_us = start.elapsed().as_micros() as u64;
        match &result {
            Err(e) if !e.is_stop() && !e.is_not_found() => warn!(
                label = %self.label,
                latency_us,
                error = %e,
                "Chain failed"
            ),
            _ => info!(
                label = %self.label,
                latency_us,
                outcome = outcome(&result),
                "Chain complete"
            ),
        }
        result
    }
}
