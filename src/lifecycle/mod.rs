//! Lifecycle Module
//!
//! Ownership and release of instances produced by a container.
//!
//! # Teardown order
//!
//! ```text
//! Container::dispose()
//!    ↓
//! 1. Child containers (depth-first, each runs this same sequence)
//!    ↓
//! 2. Owned disposables, reverse registration order   ← Disposable::dispose
//!    ↓
//! 3. Singleton caches and binding table cleared
//!    ↓
//! 4. Detach from parent
//! ```

mod bag;
mod error;
mod traits;

pub use bag::DisposeBag;
pub use error::{LifecycleError, Result};
pub use traits::{Disposable, Disposer};
