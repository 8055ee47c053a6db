//! Per-key async locks.
//!
//! Every read-modify-write of a roster, registration or application goes
//! through one of these. The map lives in process memory, so it only
//! serializes writers inside a single bot process.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

pub struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting for any other holder to release it
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard guard is dropped before awaiting
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        debug!("Acquiring lock for {:?}", key);
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let counter = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let guard = locks.lock("a".to_string()).await;

        let task = {
            let locks = locks.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let _g = locks.lock("a".to_string()).await;
                counter.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        counter.lock().push("first");
        drop(guard);
        task.await.unwrap();

        assert_eq!(*counter.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::<(String, String)>::new();
        let _a = locks.lock(("2024-05".into(), "#2PP".into())).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock(("2024-05".into(), "#9QL".into())),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_prune_removes_idle_entries() {
        let locks = KeyedLocks::<u32>::new();
        let held = locks.lock(1).await;
        drop(locks.lock(2).await);
        assert_eq!(locks.len(), 2);

        locks.prune();
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
