use crate::di::container::{Container, WeakContainer};
use crate::di::key::BindingId;
use crate::di::resolver::Request;
use crate::error::{InjexitError, Result};
use std::sync::{Arc, OnceLock};

/// A deferred dependency, resolved on first access.
///
/// `Lazy<T>` remembers the container and request it was created with and
/// resolves `T` only when [`get`](Self::get) is first called, so two services
/// may refer to each other as long as one side holds a `Lazy`. The handle does
/// not keep its container alive.
///
/// # Example
/// ```
/// use injexit::Container;
/// use std::sync::Arc;
///
/// let container = Container::new();
/// let port = container.lazy::<u16>();
/// container.bind_instance(Arc::new(8080u16));
/// assert_eq!(*port.get().unwrap(), 8080);
/// ```
pub struct Lazy<T: ?Sized + Send + Sync + 'static> {
    container: WeakContainer,
    request: Request,
    instance: OnceLock<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub(crate) fn new(container: &Container, request: Request) -> Self {
        Self {
            container: container.downgrade(),
            request,
            instance: OnceLock::new(),
        }
    }

    /// Resolve the dependency, or return the value resolved earlier
    ///
    /// # Errors
    /// Fails with `Disposed` when the container is gone, or with the
    /// resolution error of the underlying request. Failures are not cached.
    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }

        let container = self.container.upgrade().ok_or(InjexitError::Disposed)?;
        let resolved = container.resolve_request(&self.request)?.into_single::<T>()?;
        Ok(Arc::clone(self.instance.get_or_init(|| resolved)))
    }

    /// Whether the dependency was already resolved
    pub fn is_resolved(&self) -> bool {
        self.instance.get().is_some()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        let instance = OnceLock::new();
        if let Some(value) = self.instance.get() {
            let _ = instance.set(Arc::clone(value));
        }
        Self {
            container: self.container.clone(),
            request: self.request.clone(),
            instance,
        }
    }
}

impl Container {
    /// Defer resolution of `T` until first use
    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&self) -> Lazy<T> {
        Lazy::new(self, Request::of::<T>())
    }

    /// Defer resolution of `T` qualified by `id`
    pub fn lazy_id<T: ?Sized + Send + Sync + 'static>(&self, id: impl Into<BindingId>) -> Lazy<T> {
        Lazy::new(self, Request::of::<T>().with_id(id))
    }
}
