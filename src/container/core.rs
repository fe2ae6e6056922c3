use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::ContainerError;

/// A type-erased shared service.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Deferred constructor for a singleton binding. Receives the container it
/// is bound in so it can pull its own dependencies.
pub type Factory = Arc<dyn Fn(&Container) -> anyhow::Result<Service> + Send + Sync>;

#[derive(Clone)]
enum Binding {
    Value(Service),
    Lazy {
        factory: Factory,
        cell: Arc<OnceCell<Service>>,
    },
}

#[derive(Default)]
struct Bindings {
    order: Vec<String>,
    entries: HashMap<String, Binding>,
}

/// Ordered key → service registry with lazily constructed singletons.
///
/// Bindings are either plain values or factories. A factory runs at most
/// once, on the first [`Container::get`] for its key, and every later read
/// returns the same `Arc`. Re-binding a key replaces the previous binding
/// (and discards any value it produced) but keeps the key's position.
///
/// The container can be shared behind an `Arc` and is safe to read from
/// several threads; first-access races on a factory are settled by a
/// `OnceCell`, so concurrent callers still observe one instance.
///
/// A factory must not read its own key; that re-enters the cell and
/// deadlocks.
#[derive(Default)]
pub struct Container {
    bindings: RwLock<Bindings>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an eagerly supplied value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.bind(key.into(), Binding::Value(Arc::new(value)));
    }

    /// Bind an already shared service as-is.
    pub fn set_shared(&self, key: impl Into<String>, service: Service) {
        self.bind(key.into(), Binding::Value(service));
    }

    /// Bind a factory that is evaluated on first access and then cached.
    pub fn singleton<T, F>(&self, key: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |c: &Container| {
            let value = factory(c)?;
            Ok(Arc::new(value) as Service)
        });
        self.bind(
            key.into(),
            Binding::Lazy {
                factory,
                cell: Arc::new(OnceCell::new()),
            },
        );
    }

    fn bind(&self, key: String, binding: Binding) {
        let mut bindings = self.bindings.write();
        if bindings.entries.insert(key.clone(), binding).is_none() {
            bindings.order.push(key.clone());
        }
        trace!(key = %key, "Container binding registered");
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.bindings.read().entries.contains_key(key)
    }

    /// Whether the binding under `key` has produced its value yet.
    /// Plain values always count as resolved.
    #[must_use]
    pub fn is_resolved(&self, key: &str) -> bool {
        match self.bindings.read().entries.get(key) {
            Some(Binding::Value(_)) => true,
            Some(Binding::Lazy { cell, .. }) => cell.get().is_some(),
            None => false,
        }
    }

    /// Fetch the type-erased service bound under `key`, running its factory
    /// if this is the first access.
    ///
    /// # Errors
    ///
    /// [`ContainerError::UnknownBinding`] if nothing is bound under `key`,
    /// [`ContainerError::Factory`] if the factory fails. A failed factory
    /// is retried on the next access.
    pub fn get_service(&self, key: &str) -> Result<Service, ContainerError> {
        // The lock is released before the factory runs so it may read other keys.
        let binding = self
            .bindings
            .read()
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownBinding(key.to_string()))?;

        match binding {
            Binding::Value(service) => Ok(service),
            Binding::Lazy { factory, cell } => cell
                .get_or_try_init(|| {
                    debug!(key = %key, "Resolving lazy container binding");
                    factory(self)
                })
                .map(Arc::clone)
                .map_err(|source| ContainerError::Factory {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Fetch the service bound under `key` as a `T`.
    ///
    /// # Errors
    ///
    /// As [`Container::get_service`], plus [`ContainerError::TypeMismatch`]
    /// when the bound value is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, ContainerError> {
        self.get_service(key)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Remove the binding under `key`, returning whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut bindings = self.bindings.write();
        let existed = bindings.entries.remove(key).is_some();
        if existed {
            bindings.order.retain(|k| k != key);
        }
        existed
    }

    /// Keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.bindings.read().order.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .finish()
    }
}
