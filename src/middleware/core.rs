use std::sync::Arc;

use crate::error::DispatchResult;
use crate::resolver::Resolver;

/// Continuation handed to a middleware: invoking it runs everything the
/// middleware wraps.
pub type Next<'a> = &'a dyn Fn() -> DispatchResult;

/// A handler wrapping a continuation.
///
/// The middleware decides whether, when and how often `next` runs. If it
/// never calls `next`, nothing inside it executes and whatever the
/// middleware itself did to the response is the final state of the chain.
///
/// Closures of the shape `Fn(&Resolver, Next<'_>) -> DispatchResult` are
/// middleware too.
pub trait Middleware: Send + Sync {
    fn handle(&self, resolver: &Resolver, next: Next<'_>) -> DispatchResult;
}

impl<F> Middleware for F
where
    F: Fn(&Resolver, Next<'_>) -> DispatchResult + Send + Sync,
{
    fn handle(&self, resolver: &Resolver, next: Next<'_>) -> DispatchResult {
        self(resolver, next)
    }
}

/// Run `terminal` wrapped by `layers`.
///
/// The first layer is the outermost: it runs first and reaches the second
/// layer only through its continuation, and so on down to `terminal`.
pub fn run_chain(
    layers: &[Arc<dyn Middleware>],
    resolver: &Resolver,
    terminal: Next<'_>,
) -> DispatchResult {
    match layers.split_first() {
        None => terminal(),
        Some((outer, inner)) => outer.handle(resolver, &|| run_chain(inner, resolver, terminal)),
    }
}
