//! Dispose bag
//!
//! Collects disposables in registration order and releases them in reverse.

use super::{Disposable, Disposer};
use std::sync::{Arc, Mutex, PoisonError};

struct Entry {
    disposable: Arc<dyn Disposable>,
    name: String,
}

/// Ordered collection of disposables owned by one scope
///
/// # Example
///
/// ```rust,ignore
/// let bag = DisposeBag::new();
/// bag.add(connection, "Connection");
/// bag.add(cache, "Cache");
///
/// // Cache is disposed first, then Connection
/// bag.dispose_all();
/// ```
#[derive(Default)]
pub struct DisposeBag {
    entries: Mutex<Vec<Entry>>,
}

impl DisposeBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disposable under a diagnostic name
    pub fn add(&self, disposable: Arc<dyn Disposable>, name: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                disposable,
                name: name.into(),
            });
    }

    /// Dispose every registered value in **reverse order** and empty the bag
    ///
    /// A failing disposable is logged and the remaining ones still run.
    /// Returns the number of disposables that failed.
    pub fn dispose_all(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner));
        let total = entries.len();
        let mut failures = 0;

        for entry in entries.iter().rev() {
            tracing::debug!("Disposing: {}", entry.name);
            if let Err(e) = entry.disposable.dispose() {
                failures += 1;
                tracing::error!("Dispose failed for {}: {}", entry.name, e);
            }
        }

        if total > 0 {
            tracing::debug!("Disposed {} instances ({} failed)", total, failures);
        }
        failures
    }

    /// Number of values waiting to be disposed
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Disposer for DisposeBag {
    fn add_disposable(&self, disposable: Arc<dyn Disposable>) {
        self.add(disposable, "<external>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleError;

    struct Ordered {
        id: usize,
        order: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Disposable for Ordered {
        fn dispose(&self) -> Result<(), LifecycleError> {
            self.order.lock().unwrap().push(self.id);
            if self.fail {
                return Err(LifecycleError::dispose_failed("Ordered", "boom"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_dispose_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::new();

        for i in 0..3 {
            bag.add(
                Arc::new(Ordered {
                    id: i,
                    order: Arc::clone(&order),
                    fail: false,
                }),
                format!("Service{}", i),
            );
        }

        assert_eq!(bag.dispose_all(), 0);
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(bag.is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_cascade() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::new();
        bag.add(
            Arc::new(Ordered { id: 0, order: Arc::clone(&order), fail: false }),
            "First",
        );
        bag.add(
            Arc::new(Ordered { id: 1, order: Arc::clone(&order), fail: true }),
            "Second",
        );

        assert_eq!(bag.dispose_all(), 1);
        assert_eq!(*order.lock().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_second_dispose_is_noop() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::new();
        bag.add_disposable(Arc::new(Ordered { id: 7, order: Arc::clone(&order), fail: false }));

        bag.dispose_all();
        bag.dispose_all();
        assert_eq!(*order.lock().unwrap(), vec![7]);
    }
}
