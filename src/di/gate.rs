use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

/// Re-entrant gate serialising singleton construction across a container tree.
///
/// The thread holding the gate may enter again (a singleton whose constructor
/// needs another singleton); other threads block until it is fully released.
#[derive(Default)]
pub(crate) struct BuildGate {
    holder: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl BuildGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enter(&self) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match holder.as_mut() {
                None => {
                    *holder = Some((me, 1));
                    break;
                }
                Some((owner, depth)) if *owner == me => {
                    *depth += 1;
                    break;
                }
                Some(_) => {
                    holder = self
                        .released
                        .wait(holder)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        GateGuard { gate: self }
    }

    fn leave(&self) {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, depth)) = holder.as_mut() {
            *depth -= 1;
            if *depth == 0 {
                *holder = None;
                self.released.notify_all();
            }
        }
    }
}

pub(crate) struct GateGuard<'g> {
    gate: &'g BuildGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_reentrant_on_same_thread() {
        let gate = BuildGate::new();
        let outer = gate.enter();
        let inner = gate.enter();
        drop(inner);
        drop(outer);
        let _again = gate.enter();
    }

    #[test]
    fn test_excludes_other_threads() {
        let gate = BuildGate::new();
        let inside = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let _guard = gate.enter();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
