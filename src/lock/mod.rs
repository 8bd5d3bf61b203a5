use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::ParkingError;

/// Binary lock backed by `Mutex<bool>` + `Condvar`.
struct KeyLock {
    state: Mutex<bool>,
    wake: Condvar,
}

impl KeyLock {
    fn new() -> Self {
        KeyLock {
            state: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<(), ParkingError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|_| ParkingError::LockPoisoned("session lock"))?;
        while *locked {
            locked = self
                .wake
                .wait(locked)
                .map_err(|_| ParkingError::LockPoisoned("session lock wait"))?;
        }
        *locked = true;
        Ok(())
    }

    fn unlock(&self) {
        let mut locked = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *locked {
            *locked = false;
            self.wake.notify_one();
        }
    }
}

/// One lock per key, created on first use and dropped again once nobody
/// holds or waits for it.
///
/// The facility keys these by license plate so that park and unpark of the
/// same vehicle never interleave.
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<KeyLock>>>,
}

/// Releases its key on drop.
pub(crate) struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    lock: Arc<KeyLock>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        KeyedLocks {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until the key is free. Holders never wait on anything but
    /// other facility locks, so the wait is bounded by one park or unpark.
    pub(crate) fn acquire(&self, key: &str) -> Result<KeyGuard<'_>, ParkingError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| ParkingError::LockPoisoned("session lock map"))?;
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(KeyLock::new())),
            )
        };
        lock.lock()?;
        Ok(KeyGuard {
            owner: self,
            key: key.to_string(),
            lock,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Hold the map while unlocking so no new waiter can pick up the Arc
        // between the count check and the removal.
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.lock.unlock();
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
