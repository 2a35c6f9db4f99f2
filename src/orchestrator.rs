//! # Acquisition orchestrator
//! Top-level coordinator: given a fetch spec, answer from a fresh cache
//! entry, join or start a single-flight fetch, validate and write through
//! the tiers, and fall back to a stale entry rather than fail outright.
//!
//! The actual fetch always runs in a spawned task: a caller abandoning its
//! wait (timeout, cancellation) never aborts the fetch for other waiters or
//! for cache population.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::breaker::BreakerSnapshot;
use crate::cache::file::FileTier;
use crate::cache::memory::MemoryTier;
use crate::cache::{CacheEntry, CacheStats, CacheTier, TieredCache};
use crate::config::AcquireConfig;
use crate::error::AcquireError;
use crate::executor::Executor;
use crate::flight::{Flight, FlightMap};
use crate::model::{CacheKey, FetchSpec, NormalizedRecord, SourceId};
use crate::source::SourceAdapter;

/// Where an answer came from, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Fresh,
    StaleFallback,
}

/// One acquisition result. `record` is read-only for callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acquired {
    pub record: NormalizedRecord,
    pub origin: Origin,
    pub from_cache: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Overrides the configured per-kind TTL for this acquisition.
    pub ttl: Option<Duration>,
    /// Skip the fresh-cache short-circuit. Still subject to the breaker and
    /// to single-flight deduplication.
    pub force_refresh: bool,
    /// Bounds only this caller's wait; the underlying fetch keeps running.
    pub wait_timeout: Option<Duration>,
}

type Outcome = Result<Acquired, AcquireError>;

struct Shared {
    cfg: AcquireConfig,
    cache: TieredCache,
    executor: Executor,
    sources: HashMap<SourceId, Arc<dyn SourceAdapter>>,
    flights: FlightMap<Outcome>,
}

#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Build with the tier chain the configuration enables (memory, then
    /// file).
    pub fn new(cfg: AcquireConfig, sources: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
        if cfg.tiers.memory {
            tiers.push(Arc::new(MemoryTier::new(cfg.tiers.memory_capacity)));
        }
        if cfg.tiers.file {
            tiers.push(Arc::new(FileTier::new(cfg.tiers.file_dir.clone())));
        }
        Self::with_tiers(cfg, sources, tiers)
    }

    /// Build with an explicit tier chain, fastest first. Store backends are
    /// interchangeable; this is also how tests inject misbehaving tiers.
    pub fn with_tiers(
        cfg: AcquireConfig,
        sources: Vec<Arc<dyn SourceAdapter>>,
        tiers: Vec<Arc<dyn CacheTier>>,
    ) -> Self {
        let executor = Executor::new(cfg.retry.clone(), cfg.breaker.to_breaker_config());
        let sources = sources.into_iter().map(|s| (s.id(), s)).collect();
        Self {
            shared: Arc::new(Shared {
                cfg,
                cache: TieredCache::new(tiers),
                executor,
                sources,
                flights: FlightMap::new(),
            }),
        }
    }

    /// Acquire one record. See the module docs for the decision order.
    pub async fn get(&self, spec: &FetchSpec, opts: GetOptions) -> Result<Acquired, AcquireError> {
        let key = spec.cache_key();

        if !opts.force_refresh {
            if let Some(entry) = self.shared.cache.get_fresh(&key, Utc::now()).await {
                return Ok(Acquired {
                    record: entry.value,
                    origin: Origin::Fresh,
                    from_cache: true,
                    fetched_at: entry.fetched_at,
                });
            }
        }

        let mut rx = match self.shared.flights.join_or_lead(&key) {
            Flight::Leader { rx } => {
                self.spawn_fetch(key.clone(), spec.clone(), opts.ttl);
                rx
            }
            Flight::Waiter(rx) => {
                tracing::debug!(key = %key, "joined in-flight fetch");
                rx
            }
        };

        let outcome = match opts.wait_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(AcquireError::WaitTimeout { key });
                }
            },
            None => rx.recv().await,
        };

        match outcome {
            Ok(result) => result,
            Err(_closed) => Err(AcquireError::Interrupted { key }),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats().await
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.shared.executor.breaker_snapshots()
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.shared.cfg
    }

    fn spawn_fetch(&self, key: CacheKey, spec: FetchSpec, ttl_override: Option<Duration>) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let outcome = perform(&shared, &key, &spec, ttl_override).await;
            shared.flights.complete(&key, outcome);
        });
    }
}

/// Fetch, validate, populate, or decide the fallback. Runs inside the
/// single-flight leader task; its outcome is what every waiter observes.
async fn perform(
    shared: &Shared,
    key: &CacheKey,
    spec: &FetchSpec,
    ttl_override: Option<Duration>,
) -> Outcome {
    let Some(adapter) = shared.sources.get(&spec.source) else {
        return Err(AcquireError::UnknownSource(spec.source));
    };

    match shared.executor.acquire(adapter.as_ref(), spec).await {
        Ok(record) => {
            let ttl = ttl_override.unwrap_or_else(|| shared.cfg.ttl.for_kind(spec.kind));
            let entry = CacheEntry::new(record.clone(), ttl);
            let fetched_at = entry.fetched_at;
            shared.cache.put(key, entry).await;
            tracing::info!(key = %key, kind = %spec.kind, "fresh record acquired");
            Ok(Acquired {
                record,
                origin: Origin::Fresh,
                from_cache: false,
                fetched_at,
            })
        }
        Err(err) if err.allows_stale_fallback() => {
            // Ignore TTL expiry here: a stale answer beats no answer.
            if let Some(entry) = shared.cache.get_any(key).await {
                counter!("acquire_stale_fallback_total").increment(1);
                tracing::warn!(
                    key = %key,
                    kind = %spec.kind,
                    error = %err,
                    age_secs = (Utc::now() - entry.fetched_at).num_seconds(),
                    "fetch failed, serving stale cache entry"
                );
                Ok(Acquired {
                    record: entry.value,
                    origin: Origin::StaleFallback,
                    from_cache: true,
                    fetched_at: entry.fetched_at,
                })
            } else {
                counter!("acquire_errors_total").increment(1);
                tracing::warn!(key = %key, kind = %spec.kind, error = %err, "fetch failed with no cached fallback");
                Err(err)
            }
        }
        Err(err) => Err(err),
    }
}
