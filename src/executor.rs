//! # Executor
//! Wraps source adapter calls with retry, exponential backoff, and the
//! per-source circuit breaker. Validation runs here too, so failure
//! accounting is single-sourced: the breaker sees every attempt, including
//! permanent and validation failures (the source is unusable right now
//! either way).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, histogram};

use crate::breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker};
use crate::config::RetrySettings;
use crate::error::{AcquireError, FetchError};
use crate::model::{FetchSpec, NormalizedRecord, SourceId};
use crate::source::SourceAdapter;
use crate::validate;

pub struct Executor {
    retry: RetrySettings,
    breaker_cfg: BreakerConfig,
    breakers: Mutex<HashMap<SourceId, Arc<CircuitBreaker>>>,
}

impl Executor {
    pub fn new(retry: RetrySettings, breaker_cfg: BreakerConfig) -> Self {
        Self {
            retry,
            breaker_cfg,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    fn breaker(&self, source: SourceId) -> Arc<CircuitBreaker> {
        let mut map = self.breakers.lock().expect("breaker map mutex poisoned");
        map.entry(source)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(source, self.breaker_cfg)))
            .clone()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        let map = self.breakers.lock().expect("breaker map mutex poisoned");
        let mut out: Vec<_> = map.values().map(|b| b.snapshot()).collect();
        out.sort_by_key(|s| s.source.as_str());
        out
    }

    /// Fetch and validate one spec. Transient failures are retried with
    /// exponential backoff up to `max_retries` total attempts; permanent and
    /// validation failures bail immediately. Never surfaces retry counts to
    /// the caller, only the final kinded error.
    pub async fn acquire(
        &self,
        adapter: &dyn SourceAdapter,
        spec: &FetchSpec,
    ) -> Result<NormalizedRecord, AcquireError> {
        let source = adapter.id();
        let breaker = self.breaker(source);
        let mut failures: u32 = 0;

        loop {
            breaker
                .try_acquire()
                .map_err(|remaining| AcquireError::CircuitOpen {
                    source_id: source,
                    retry_in_secs: remaining.as_secs(),
                })?;

            counter!("acquire_fetch_attempts_total").increment(1);
            let started = tokio::time::Instant::now();
            let result = adapter.fetch(spec).await;
            histogram!("acquire_fetch_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

            match result {
                Ok(raw) => match validate::normalize(raw) {
                    Ok(record) => {
                        breaker.on_success();
                        return Ok(record);
                    }
                    Err(e) => {
                        breaker.on_failure();
                        counter!("acquire_validation_failures_total").increment(1);
                        tracing::warn!(source = %source, kind = %spec.kind, error = %e, "payload rejected");
                        return Err(AcquireError::Validation(e));
                    }
                },
                Err(e @ FetchError::Permanent { .. }) => {
                    breaker.on_failure();
                    counter!("acquire_fetch_failures_total").increment(1);
                    tracing::warn!(source = %source, kind = %spec.kind, error = %e, "permanent fetch failure");
                    return Err(AcquireError::Fetch(e));
                }
                Err(e @ FetchError::Transient { .. }) => {
                    breaker.on_failure();
                    counter!("acquire_fetch_failures_total").increment(1);
                    failures += 1;
                    if failures >= self.retry.max_retries {
                        tracing::warn!(
                            source = %source,
                            kind = %spec.kind,
                            attempts = failures,
                            error = %e,
                            "retries exhausted"
                        );
                        return Err(AcquireError::Fetch(e));
                    }
                    let delay = backoff_delay(&self.retry, failures);
                    tracing::debug!(
                        source = %source,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Delay before the attempt following the `failures`-th consecutive failure:
/// `base * 2^(failures - 1)`, capped at `backoff_max_ms`.
pub fn backoff_delay(retry: &RetrySettings, failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(16);
    let ms = retry
        .backoff_base_ms
        .saturating_mul(1u64 << exp)
        .min(retry.backoff_max_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(base_ms: u64, max_ms: u64) -> RetrySettings {
        RetrySettings {
            max_retries: 3,
            backoff_base_ms: base_ms,
            backoff_max_ms: max_ms,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = retry(500, 8_000);
        assert_eq!(backoff_delay(&cfg, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(&cfg, 2), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&cfg, 3), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(&cfg, 5), Duration::from_millis(8_000));
        assert_eq!(backoff_delay(&cfg, 30), Duration::from_millis(8_000));
    }
}
