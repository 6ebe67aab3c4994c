//! # Keyed Locks
//!
//! One async mutex per key (product code or user), created on first use.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LockTable("product")                                                   │
//! │                                                                         │
//! │   "1001" ──► Arc<Mutex<()>>     held by checkout A                      │
//! │   "1002" ──► Arc<Mutex<()>>     held by checkout A                      │
//! │   "2001" ──► Arc<Mutex<()>>     held by record_entry                    │
//! │                                                                         │
//! │  lock_all(["1002", "1001", "1002"])  →  locks "1001" then "1002"        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-key acquisition always goes in sorted order, so two callers that
//! need overlapping key sets cannot deadlock.
//!
//! Entries nobody holds or waits on are dropped once the table reaches
//! [`PRUNE_AT`] keys. A held guard keeps its `Arc` alive, so pruning never
//! removes a mutex that is in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Table size at which idle entries are pruned.
pub const PRUNE_AT: usize = 1024;

/// Holds one key locked until dropped.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A table of per-key async mutexes.
#[derive(Debug)]
pub struct LockTable {
    name: &'static str,
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    pub fn new(name: &'static str) -> Self {
        LockTable {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= PRUNE_AT {
            Self::retain_busy(&mut entries);
        }
        entries.entry(key.to_string()).or_default().clone()
    }

    /// Drops entries that are neither held nor awaited. Returns how many
    /// were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let removed = Self::retain_busy(&mut entries);
        trace!(table = self.name, removed, "Pruned idle locks");
        removed
    }

    fn retain_busy(entries: &mut HashMap<String, Arc<AsyncMutex<()>>>) -> usize {
        let before = entries.len();
        // the table's own reference is the only one left on an idle entry
        entries.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - entries.len()
    }

    /// Waits for and takes the lock for `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.entry(key).lock_owned().await
    }

    /// Takes the locks for every key, deduplicated, in sorted order.
    pub async fn lock_all<I, S>(&self, keys: I) -> Vec<KeyGuard>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        keys.sort();
        keys.dedup();
        trace!(table = self.name, keys = ?keys, "Acquiring locks");

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let table = LockTable::new("product");
        let guard = table.lock("1001").await;

        let second = tokio::time::timeout(Duration::from_millis(20), table.lock("1001")).await;
        assert!(second.is_err(), "second lock on the same key must wait");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(200), table.lock("1001")).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let table = LockTable::new("user");
        let _a = table.lock("ana").await;
        let b = tokio::time::timeout(Duration::from_millis(200), table.lock("beto")).await;
        assert!(b.is_ok());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_all_dedups() {
        let table = LockTable::new("product");
        let guards = table.lock_all(["1002", "1001", "1002"]).await;
        assert_eq!(guards.len(), 2);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let table = LockTable::new("product");
        let held = table.lock("1001").await;
        drop(table.lock("1002").await);
        drop(table.lock("1003").await);
        assert_eq!(table.len(), 3);

        assert_eq!(table.prune(), 2);
        assert_eq!(table.len(), 1);

        // still exclusive after pruning
        let again = tokio::time::timeout(Duration::from_millis(20), table.lock("1001")).await;
        assert!(again.is_err());
        drop(held);
        assert!(tokio::time::timeout(Duration::from_millis(200), table.lock("1001"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_table_stays_bounded() {
        let table = LockTable::new("user");
        for i in 0..(PRUNE_AT * 2) {
            drop(table.lock(&format!("user-{i}")).await);
        }
        assert!(table.len() <= PRUNE_AT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_sets_do_not_deadlock() {
        let table = Arc::new(LockTable::new("product"));

        let mut handles = Vec::new();
        for i in 0..20 {
            let table = table.clone();
            handles.push(tokio::spawn(async move {
                let keys = if i % 2 == 0 { ["a", "b", "c"] } else { ["c", "b", "a"] };
                let _guards = table.lock_all(keys).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = async {
            for handle in handles {
                handle.await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("lock_all deadlocked");
    }
}
