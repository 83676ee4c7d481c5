//! Per-key locks that serialize concurrent cache misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One tracked key: its lock and how many tasks hold or wait on it.
#[derive(Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

type LockMap = Mutex<HashMap<String, Slot>>;

/// A set of async locks keyed by query.
///
/// Holding the guard for a key means no other task holding a guard for the
/// same key is past its cache re-check. Keys are dropped from the map once
/// nobody holds or waits on them, including waiters that were cancelled.
#[derive(Default)]
pub struct InflightLocks {
    locks: Arc<LockMap>,
}

impl InflightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and takes it.
    pub async fn acquire(&self, key: &str) -> InflightGuard {
        let lock = {
            let mut locks = lock_map(&self.locks);
            let slot = locks.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        // Registered before waiting so a dropped future still releases the slot.
        let mut held = InflightGuard {
            key: key.to_string(),
            guard: None,
            locks: Arc::clone(&self.locks),
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_map(locks: &LockMap) -> MutexGuard<'_, HashMap<String, Slot>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hold on one key. Releases the key, and forgets it when unused, on drop.
pub struct InflightGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = lock_map(&self.locks);
        let unused = match locks.get_mut(&self.key) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            }
            None => false,
        };
        if unused {
            locks.remove(&self.key);
        }
    }
}
