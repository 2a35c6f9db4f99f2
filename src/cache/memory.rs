//! In-process cache tier with LRU capacity eviction.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::{CacheEntry, CacheTier, TierName, TierUnavailable};
use crate::model::CacheKey;

pub struct MemoryTier {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<CacheKey, CacheEntry>,
    /// Recency order, least-recent first. Touched on get and set.
    order: VecDeque<CacheKey>,
}

impl MemoryTier {
    /// `capacity == 0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }
}

impl Inner {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> TierName {
        TierName::Memory
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, TierUnavailable> {
        let mut inner = self.inner.lock().expect("memory tier mutex poisoned");
        let hit = inner.map.get(key).cloned();
        if hit.is_some() {
            inner.touch(key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), TierUnavailable> {
        let mut inner = self.inner.lock().expect("memory tier mutex poisoned");
        inner.map.insert(key.clone(), entry);
        inner.touch(key);
        if self.capacity > 0 {
            while inner.map.len() > self.capacity {
                let Some(evicted) = inner.order.pop_front() else {
                    break;
                };
                inner.map.remove(&evicted);
                tracing::debug!(key = %evicted, "memory tier evicted lru entry");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), TierUnavailable> {
        let mut inner = self.inner.lock().expect("memory tier mutex poisoned");
        inner.map.remove(key);
        if let Some(pos) = inner.order.iter().position(|k| k == key) {
            inner.order.remove(pos);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, TierUnavailable> {
        Ok(self.inner.lock().expect("memory tier mutex poisoned").map.len())
    }
}
