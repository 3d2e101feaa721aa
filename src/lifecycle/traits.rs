//! Disposal traits
//!
//! These traits define the contract between owned instances and the scope
//! that releases them.

use super::LifecycleError;
use std::sync::Arc;

/// Implemented by values that hold resources which must be released when
/// their owning container is disposed.
///
/// # Example
///
/// ```rust
/// use injexit::lifecycle::{Disposable, LifecycleError};
///
/// struct Connection;
///
/// impl Disposable for Connection {
///     fn dispose(&self) -> Result<(), LifecycleError> {
///         // close sockets, flush buffers
///         Ok(())
///     }
/// }
/// ```
pub trait Disposable: Send + Sync {
    /// Release the resources held by this value
    ///
    /// Called at most once per registration, in reverse registration order.
    fn dispose(&self) -> Result<(), LifecycleError>;
}

/// A sink that accepts values to be disposed when its scope ends
///
/// Every [`Container`](crate::Container) is a `Disposer`; externally created
/// values can be handed to it so they share the container's lifetime.
pub trait Disposer {
    /// Register a value for disposal
    fn add_disposable(&self, disposable: Arc<dyn Disposable>);
}
