use std::sync::{Mutex, MutexGuard};

/// Acquire mutex guard, ignoring poisoning
///
/// Every critical section in this crate leaves its data consistent before
/// anything that can panic runs, so a poisoned lock is still usable.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
