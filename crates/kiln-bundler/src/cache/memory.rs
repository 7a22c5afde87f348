//! In-process cache backend.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use super::{BuildCache, CacheEntry, CacheError, CacheKey, CacheResult};

/// Cache kept in a concurrent map; lives as long as the process.
///
/// Used by dev sessions, where consecutive rebuilds share one instance, and
/// by tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    closed: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendered keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

impl BuildCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        self.ensure_open()?;
        self.entries
            .get(&key.to_string())
            .map(|entry| entry.value().clone())
            .ok_or(CacheError::CacheMiss)
    }

    fn set(&self, entry: CacheEntry) -> CacheResult<()> {
        self.ensure_open()?;
        match self.entries.get(&entry.key) {
            Some(existing) if existing.same_payload(&entry) => return Ok(()),
            _ => {}
        }
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.ensure_open()?;
        self.entries.clear();
        Ok(())
    }

    fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheTier, CachedFile};

    fn entry(name: &str) -> (CacheKey, CacheEntry) {
        let key = CacheKey::from_parts(CacheTier::Plan, [name]);
        let entry = CacheEntry::new(&key, "dist", vec![CachedFile::new("plan.json", name)]);
        (key, entry)
    }

    #[test]
    fn set_get_and_idempotence() {
        let cache = MemoryCache::new();
        let (key, stored) = entry("a");

        cache.set(stored.clone()).unwrap();
        cache.set(stored.clone()).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap(), stored);
    }

    #[test]
    fn miss_and_clear() {
        let cache = MemoryCache::new();
        let (key, stored) = entry("a");
        assert!(cache.get(&key).unwrap_err().is_miss());

        cache.set(stored).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn closed_cache_rejects_operations() {
        let cache = MemoryCache::new();
        let (key, stored) = entry("a");
        cache.close().unwrap();
        cache.close().unwrap();
        assert!(matches!(cache.set(stored), Err(CacheError::Closed)));
        assert!(matches!(cache.get(&key), Err(CacheError::Closed)));
    }
}
