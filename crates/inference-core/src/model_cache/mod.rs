//! Model cache: single-flight loading plus LRU-and-byte-budget eviction.
//!
//! Grounded in the original `model_cache.py`, with one deliberate
//! correction. There, a cache miss releases the lock, awaits
//! `_load_model`, then re-acquires the lock to call `_add_to_cache` as a
//! separate step — two concurrent misses on the same key can both start a
//! load. Here a miss installs a `Loading` placeholder under the same lock
//! that guards the map, so every other caller for that key blocks on the
//! first load instead of starting its own.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::config::ModelCacheConfig;
use crate::error::{CoreError, Result};
use crate::provider::{ModelHandle, Provider};

enum Slot {
    Loading,
    Ready(Arc<ModelHandle>),
}

struct Inner {
    slots: HashMap<String, Slot>,
    /// Access order for eviction; `Loading` keys are absent until ready.
    order: LruCache<String, ()>,
    bytes_used: u64,
}

/// Aggregate cache counters exposed to the dashboard broadcaster.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelCacheStats {
    pub entries: usize,
    pub bytes_used: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
}

pub struct ModelCache {
    config: ModelCacheConfig,
    provider: Arc<dyn Provider>,
    inner: Mutex<Inner>,
    /// Signalled whenever a `Loading` slot transitions to `Ready` or is
    /// removed after a failed load, so waiters can recheck.
    ready: Condvar,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
    evictions: std::sync::atomic::AtomicU64,
    loads: std::sync::atomic::AtomicU64,
}

impl ModelCache {
    pub fn new(config: ModelCacheConfig, provider: Arc<dyn Provider>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).unwrap();
        Self {
            config,
            provider,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: LruCache::new(capacity),
                bytes_used: 0,
            }),
            ready: Condvar::new(),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
            evictions: std::sync::atomic::AtomicU64::new(0),
            loads: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Returns the model named by `key`, loading it via the provider on a
    /// miss. Concurrent callers for the same key share a single load.
    ///
    /// Each call is counted exactly once: a hit if a `Ready` slot is found
    /// on the first check, a miss otherwise (including a caller that has to
    /// wait on someone else's in-flight load).
    pub fn get(&self, key: &str) -> Result<Arc<ModelHandle>> {
        let mut counted = false;
        loop {
            let mut inner = self.inner.lock();
            match inner.slots.get(key) {
                Some(Slot::Ready(handle)) => {
                    inner.order.put(key.to_string(), ());
                    if !counted {
                        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    return Ok(handle.clone());
                }
                Some(Slot::Loading) => {
                    if !counted {
                        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        counted = true;
                    }
                    // Another caller is loading this key; wait and recheck.
                    self.ready.wait(&mut inner);
                    continue;
                }
                None => {
                    inner.slots.insert(key.to_string(), Slot::Loading);
                    if !counted {
                        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    drop(inner);
                    return self.load_and_install(key);
                }
            }
        }
    }

    fn load_and_install(&self, key: &str) -> Result<Arc<ModelHandle>> {
        self.loads.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let loaded = self.provider.load(key).map_err(|e| CoreError::ModelLoadFailed {
            key: key.to_string(),
            message: e.to_string(),
        });

        let mut inner = self.inner.lock();
        match loaded {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.evict_to_fit(&mut inner, handle.size_bytes);
                inner.bytes_used += handle.size_bytes;
                inner.slots.insert(key.to_string(), Slot::Ready(handle.clone()));
                inner.order.put(key.to_string(), ());
                self.ready.notify_all();
                Ok(handle)
            }
            Err(err) => {
                inner.slots.remove(key);
                self.ready.notify_all();
                Err(err)
            }
        }
    }

    /// Evicts least-recently-used entries until `incoming_bytes` fits within
    /// `max_bytes`, and while the entry count is at `max_entries`.
    fn evict_to_fit(&self, inner: &mut Inner, incoming_bytes: u64) {
        while inner.order.len() >= self.config.max_entries
            || inner.bytes_used + incoming_bytes > self.config.max_bytes
        {
            let Some((victim_key, _)) = inner.order.pop_lru() else {
                break;
            };
            if let Some(Slot::Ready(handle)) = inner.slots.remove(&victim_key) {
                inner.bytes_used = inner.bytes_used.saturating_sub(handle.size_bytes);
                self.evictions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(Slot::Ready(handle)) = inner.slots.remove(key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(handle.size_bytes);
        }
        inner.order.pop(key);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.order.clear();
        inner.bytes_used = 0;
    }

    pub fn stats(&self) -> ModelCacheStats {
        let inner = self.inner.lock();
        ModelCacheStats {
            entries: inner.order.len(),
            bytes_used: inner.bytes_used,
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            evictions: self.evictions.load(std::sync::atomic::Ordering::Relaxed),
            loads: self.loads.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("model_cache_test.rs");
}
