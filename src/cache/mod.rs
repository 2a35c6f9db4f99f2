//! # Tiered cache
//! Ordered chain of storage tiers, fastest first. A tier outage degrades
//! cache coverage (logged, counted) but never fails a call; freshness is a
//! property of the entry, eviction is a property of the tier.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CacheKey, NormalizedRecord};

/// Storage tier name; ordering of tiers is decided by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    Memory,
    File,
}

impl TierName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::Memory => "memory",
            TierName::File => "file",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal tier degradation; absorbed by the manager.
#[derive(Debug, Clone, Error)]
#[error("cache tier {tier} unavailable: {reason}")]
pub struct TierUnavailable {
    pub tier: TierName,
    pub reason: String,
}

/// One stored value with its freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: NormalizedRecord,
    pub fetched_at: DateTime<Utc>,
    /// Always >= 1; TTL only marks entries stale, it does not evict them.
    ttl_secs: u64,
    /// Which tier served this entry; populated on read, never stored.
    #[serde(skip)]
    pub tier: Option<TierName>,
}

impl CacheEntry {
    pub fn new(value: NormalizedRecord, ttl: Duration) -> Self {
        Self::new_at(value, ttl, Utc::now())
    }

    /// `fetched_at` is explicit so tests can backdate entries.
    pub fn new_at(value: NormalizedRecord, ttl: Duration, fetched_at: DateTime<Utc>) -> Self {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            tracing::warn!(kind = %value.kind(), "zero ttl clamped to 1s");
        }
        Self {
            value,
            fetched_at,
            ttl_secs: ttl_secs.max(1),
            tier: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + chrono::Duration::seconds(self.ttl_secs as i64)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

#[async_trait]
pub trait CacheTier: Send + Sync {
    fn name(&self) -> TierName;
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, TierUnavailable>;
    async fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), TierUnavailable>;
    async fn delete(&self, key: &CacheKey) -> Result<(), TierUnavailable>;
    async fn count(&self) -> Result<usize, TierUnavailable>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: TierName,
    pub available: bool,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tiers: Vec<TierStats>,
}

/// Ordered tier chain. Lookups take the first hit and backfill faster
/// tiers; writes go through to every tier with the same TTL.
pub struct TieredCache {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl TieredCache {
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// First *fresh* hit wins and is promoted into every faster tier. Stale
    /// entries are skipped (a slower tier may still hold a fresh copy) but
    /// never deleted here.
    pub async fn get_fresh(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            match tier.get(key).await {
                Ok(Some(mut entry)) if entry.is_fresh(now) => {
                    entry.tier = Some(tier.name());
                    tracing::debug!(key = %key, tier = %tier.name(), "cache hit");
                    counter!("acquire_cache_hits_total").increment(1);
                    self.promote(key, &entry, idx).await;
                    return Some(entry);
                }
                Ok(_) => {}
                Err(e) => self.note_unavailable("get", &e),
            }
        }
        counter!("acquire_cache_misses_total").increment(1);
        None
    }

    /// Any-age lookup for the stale-fallback path; first hit in tier order
    /// wins, freshness deliberately ignored.
    pub async fn get_any(&self, key: &CacheKey) -> Option<CacheEntry> {
        for tier in &self.tiers {
            match tier.get(key).await {
                Ok(Some(mut entry)) => {
                    entry.tier = Some(tier.name());
                    return Some(entry);
                }
                Ok(None) => {}
                Err(e) => self.note_unavailable("get", &e),
            }
        }
        None
    }

    /// Write-through to every tier.
    pub async fn put(&self, key: &CacheKey, entry: CacheEntry) {
        for tier in &self.tiers {
            if let Err(e) = tier.set(key, entry.clone()).await {
                self.note_unavailable("set", &e);
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        for tier in &self.tiers {
            if let Err(e) = tier.delete(key).await {
                self.note_unavailable("delete", &e);
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let mut tiers = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            match tier.count().await {
                Ok(entries) => tiers.push(TierStats {
                    tier: tier.name(),
                    available: true,
                    entries,
                }),
                Err(e) => {
                    self.note_unavailable("count", &e);
                    tiers.push(TierStats {
                        tier: tier.name(),
                        available: false,
                        entries: 0,
                    });
                }
            }
        }
        CacheStats { tiers }
    }

    async fn promote(&self, key: &CacheKey, entry: &CacheEntry, upto: usize) {
        for tier in &self.tiers[..upto] {
            if let Err(e) = tier.set(key, entry.clone()).await {
                self.note_unavailable("promote", &e);
            }
        }
    }

    fn note_unavailable(&self, op: &'static str, e: &TierUnavailable) {
        counter!("acquire_tier_unavailable_total").increment(1);
        tracing::warn!(tier = %e.tier, op, reason = %e.reason, "cache tier unavailable, continuing without it");
    }
}
