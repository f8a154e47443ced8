//! Atomically swappable, read-mostly shared state.

use std::sync::{Arc, PoisonError, RwLock};

/// Holds an `Arc<T>` that readers clone and writers replace wholesale.
///
/// Readers never observe a half-built value: they either get the previous
/// snapshot or the new one, and a snapshot they hold stays valid after a
/// swap.
pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        // A poisoned lock still holds a complete Arc; the swap is a single
        // assignment.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the snapshot, returning the previous one.
    pub fn store(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
