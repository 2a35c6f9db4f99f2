//! Background refresh: re-acquires configured data kinds on an interval so
//! the tiers stay warm and stale-fallback always has something to serve.

use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::model::FetchSpec;
use crate::orchestrator::{GetOptions, Orchestrator};

#[derive(Debug, Clone)]
pub struct RefreshCfg {
    pub interval: Duration,
    pub specs: Vec<FetchSpec>,
}

/// Spawn the refresh loop. The first sweep runs immediately, warming the
/// cache at startup; failures are logged and retried on the next tick.
pub fn spawn_refresh(orchestrator: Orchestrator, cfg: RefreshCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        loop {
            ticker.tick().await;
            for spec in &cfg.specs {
                match orchestrator.get(spec, GetOptions::default()).await {
                    Ok(acquired) => tracing::debug!(
                        kind = %spec.kind,
                        origin = ?acquired.origin,
                        from_cache = acquired.from_cache,
                        "refresh tick"
                    ),
                    Err(e) => tracing::warn!(kind = %spec.kind, error = %e, "refresh tick failed"),
                }
            }
            counter!("acquire_refresh_runs_total").increment(1);
        }
    })
}
