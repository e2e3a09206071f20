use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// What a scheduling lock serializes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Appointment(Uuid),
    Professional(Uuid),
    Customer(Uuid),
}

/// Guards held for the duration of a check-then-write sequence. Dropping it
/// releases every key.
#[derive(Debug)]
pub struct SchedulingGuard {
    keys: Vec<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SchedulingGuard {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

/// In-process keyed mutual exclusion for booking and status writes.
#[derive(Debug, Default, Clone)]
pub struct SchedulingLocks {
    entries: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl SchedulingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all keys in their total order so two callers never wait on
    /// each other in opposite directions.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> SchedulingGuard {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            let entry = self.entry(*key);
            guards.push(entry.lock_owned().await);
        }

        debug!("Acquired scheduling locks {:?}", keys);
        SchedulingGuard { keys, _guards: guards }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn entry(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop entries nobody holds or waits on.
        entries.retain(|k, lock| *k == key || Arc::strong_count(lock) > 1);
        entries.entry(key).or_default().clone()
    }
}
