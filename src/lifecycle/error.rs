//! Lifecycle-specific error types

use thiserror::Error;

/// Errors raised while tearing down owned instances
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A disposable failed to release its resources
    #[error("Dispose failed for {service}: {message}")]
    DisposeFailed {
        /// Type name of the instance being disposed
        service: String,
        /// Error message
        message: String,
    },
}

impl LifecycleError {
    /// Create a dispose failure error
    pub fn dispose_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DisposeFailed {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
