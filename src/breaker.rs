//! # Circuit breaker
//! Per-source failure isolation. Lifecycle is owned exclusively by the
//! executor: nothing else transitions the state.
//!
//! `Closed` passes calls through and counts consecutive failures; at the
//! configured threshold the breaker opens and fails fast for a cool-down
//! interval; after that, exactly one probe is admitted (`HalfOpen`). A
//! successful probe closes the breaker, a failed one restarts the cool-down.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::model::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before probing.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    source: SourceId,
    cfg: BreakerConfig,
    inner: Mutex<Inner>,
}

/// Read-only view for diagnostics (`/debug/breakers`).
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub source: SourceId,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

impl CircuitBreaker {
    pub fn new(source: SourceId, cfg: BreakerConfig) -> Self {
        Self {
            source,
            cfg,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Admission check before an adapter invocation. `Err` carries the time
    /// remaining until the next probe is allowed.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.cfg.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(source = %self.source, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(self.cfg.cooldown - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.cfg.cooldown)
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if inner.state != CircuitState::Closed {
            tracing::info!(source = %self.source, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        match inner.state {
            CircuitState::HalfOpen => {
                // Failed probe: restart the cool-down.
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                tracing::warn!(source = %self.source, "probe failed, circuit re-opened");
            }
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.cfg.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    metrics::counter!("acquire_breaker_open_total").increment(1);
                    tracing::warn!(
                        source = %self.source,
                        failures = inner.consecutive_failures,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            source: self.source,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }
}
