use crate::container::Container;
use crate::registry::Registry;

/// A unit of boot-time setup: binds services into the container and
/// registers handler classes or middleware.
///
/// Providers run once each, in registration order, during
/// [`Core::boot`](super::Core::boot). Closures with the same signature
/// are providers too.
pub trait ServiceProvider: Send + Sync {
    /// # Errors
    ///
    /// Any failure aborts the boot.
    fn register(&self, app: &Container, classes: &Registry) -> anyhow::Result<()>;

    /// Name used in boot logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> ServiceProvider for F
where
    F: Fn(&Container, &Registry) -> anyhow::Result<()> + Send + Sync,
{
    fn register(&self, app: &Container, classes: &Registry) -> anyhow::Result<()> {
        self(app, classes)
    }

    fn name(&self) -> &str {
        "closure"
    }
}
