//! Lock helpers that shrug off poisoning.
//!
//! A poisoned lock only means another thread panicked while holding it. The
//! panic itself is what gets reported; the shared data here (canned replies,
//! call logs) stays usable.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Poison-tolerant acquisition for `Mutex`.
pub trait IgnoreLock<T> {
    /// Lock the mutex, clearing any poison.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnoreLock<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Poison-tolerant acquisition for `RwLock`.
pub trait IgnoreRwLock<T> {
    /// Shared access, clearing any poison.
    fn read_ignore_poison(&self) -> RwLockReadGuard<'_, T>;

    /// Exclusive access, clearing any poison.
    fn write_ignore_poison(&self) -> RwLockWriteGuard<'_, T>;
}

impl<T> IgnoreRwLock<T> for RwLock<T> {
    fn read_ignore_poison(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_ignore_poison(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mutex_survives_poison() {
        let shared = Arc::new(Mutex::new(vec!["before"]));
        let clone = Arc::clone(&shared);
        let outcome = thread::spawn(move || {
            let _guard = clone.lock_ignore_poison();
            panic!("poison the lock");
        })
        .join();
        assert!(outcome.is_err_and(|payload| payload.is::<&str>()));

        shared.lock_ignore_poison().push("after");
        assert_eq!(*shared.lock_ignore_poison(), vec!["before", "after"]);
    }

    #[test]
    fn test_rwlock_read_and_write() {
        let lock = RwLock::new(vec!["a"]);
        lock.write_ignore_poison().push("b");
        assert_eq!(lock.read_ignore_poison().len(), 2);
    }
}
