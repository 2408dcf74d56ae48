//! Key-value storage behind the cache plugin.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;

/// Byte store with per-entry time to live. Implementations must be safe to
/// share between concurrently sent requests.
pub trait CacheStore: Send + Sync {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn save(&self, key: &str, data: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Returns whether an entry was removed.
    fn delete(&self, key: &str) -> Result<bool>;
}

#[derive(Debug)]
struct Item {
    data:       Vec<u8>,
    expires_at: Instant,
    last_used:  u64,
}

#[derive(Debug, Default)]
struct Inner {
    items:     HashMap<String, Item>,
    clock:     u64,
    evictions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries:   usize,
    pub capacity:  usize,
    pub evictions: u64,
}

/// Bounded in-memory store.
///
/// Expired entries are dropped on access. When a new key would exceed the
/// capacity, expired entries are purged first; if the store is still full
/// the least recently used tenth of it is evicted.
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    inner:    Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new(1024) }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner:    Mutex::new(Inner::default()),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            entries:   inner.items.len(),
            capacity:  self.capacity,
            evictions: inner.evictions,
        }
    }

    pub fn clear(&self) { self.lock().items.clear(); }

    fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }

    fn make_room(&self, inner: &mut Inner, now: Instant) {
        inner.items.retain(|_, item| item.expires_at > now);
        if inner.items.len() < self.capacity {
            return;
        }

        let batch = (self.capacity / 10).max(1);
        let mut by_age: Vec<(u64, String)> = inner
            .items
            .iter()
            .map(|(key, item)| (item.last_used, key.clone()))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(batch) {
            inner.items.remove(&key);
            inner.evictions += 1;
        }
        debug!(evicted = batch, capacity = self.capacity, "cache store eviction");
    }
}

impl CacheStore for MemoryStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.clock += 1;
        let clock = inner.clock;

        let expired = match inner.items.get_mut(key) {
            None => return Ok(None),
            Some(item) if item.expires_at <= now => true,
            Some(item) => {
                item.last_used = clock;
                return Ok(Some(item.data.clone()));
            },
        };
        if expired {
            inner.items.remove(key);
        }
        Ok(None)
    }

    fn save(&self, key: &str, data: Vec<u8>, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut inner = self.lock();
        if !inner.items.contains_key(key) && inner.items.len() >= self.capacity {
            self.make_room(&mut inner, now);
        }
        inner.clock += 1;
        let item = Item {
            data,
            expires_at: now + ttl,
            last_used: inner.clock,
        };
        inner.items.insert(key.to_string(), item);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> { Ok(self.lock().items.remove(key).is_some()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_save_fetch_delete() {
        let store = MemoryStore::new(4);
        store.save("a", b"one".to_vec(), MINUTE).unwrap();

        assert_eq!(store.fetch("a").unwrap(), Some(b"one".to_vec()));
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.fetch("a").unwrap(), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let store = MemoryStore::new(4);
        store.save("a", b"one".to_vec(), Duration::ZERO).unwrap();

        assert_eq!(store.fetch("a").unwrap(), None);
        assert_eq!(store.stats().entries, 0);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let store = MemoryStore::new(3);
        for key in ["a", "b", "c"] {
            store.save(key, key.as_bytes().to_vec(), MINUTE).unwrap();
        }
        store.fetch("a").unwrap();
        store.save("d", b"d".to_vec(), MINUTE).unwrap();

        assert!(store.fetch("a").unwrap().is_some());
        assert!(store.fetch("b").unwrap().is_none());
        assert!(store.fetch("d").unwrap().is_some());
        let stats = store.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let store = MemoryStore::new(2);
        store.save("a", b"1".to_vec(), MINUTE).unwrap();
        store.save("b", b"2".to_vec(), MINUTE).unwrap();
        store.save("a", b"3".to_vec(), MINUTE).unwrap();

        assert_eq!(store.fetch("a").unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.stats().evictions, 0);
    }
}
