//! Per-key write serialization for snapshot upserts.
//!
//! [`WriteLocks`] stores one [`tokio::sync::Mutex`] per key in a
//! `HashMap`. Writers to the same key are serialized while writers to
//! different keys run concurrently. The outer map is only write-locked
//! the first time a key is seen.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{MetricKind, ParachainId};

/// Lock key for snapshot writes: one lock per parachain and time series.
pub type SnapshotLockKey = (ParachainId, MetricKind);

/// Registry of per-key async mutexes.
///
/// # Concurrency
///
/// - Writes to different keys are concurrent.
/// - Writes to the same key are serialized in acquisition order.
#[derive(Debug)]
pub struct WriteLocks<K> {
    locks: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> WriteLocks<K>
where
    K: Eq + Hash + Copy,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `key`, creating it on first use.
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&key).map(Arc::clone);
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut map = self.locks.write().await;
                Arc::clone(map.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
            }
        };
        lock.lock_owned().await
    }

    /// Returns the number of keys seen so far.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    /// Returns `true` if no key has been locked yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

impl<K> Default for WriteLocks<K>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
