//! Scripted source adapter: the test harness, also used by the demo binary
//! to serve embedded sample payloads without touching the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FetchError;
use crate::model::{FetchSpec, RawResult, SourceId};
use crate::source::SourceAdapter;

#[derive(Debug, Clone)]
pub enum FixtureOutcome {
    Ok(serde_json::Value),
    Transient(String),
    Permanent(String),
}

/// Adapter that replays a scripted sequence of outcomes, then falls back to
/// a fixed payload (if any). Every invocation is counted, which is what the
/// retry/single-flight tests assert on.
pub struct FixtureSource {
    id: SourceId,
    script: Mutex<VecDeque<FixtureOutcome>>,
    fallback: Option<serde_json::Value>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Payload served once the script runs out.
    pub fn with_fallback(mut self, payload: serde_json::Value) -> Self {
        self.fallback = Some(payload);
        self
    }

    /// Simulated fetch latency, applied before each outcome.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, payload: serde_json::Value) -> &Self {
        self.push(FixtureOutcome::Ok(payload))
    }

    pub fn push_transient(&self, reason: &str) -> &Self {
        self.push(FixtureOutcome::Transient(reason.to_string()))
    }

    pub fn push_permanent(&self, reason: &str) -> &Self {
        self.push(FixtureOutcome::Permanent(reason.to_string()))
    }

    pub fn push(&self, outcome: FixtureOutcome) -> &Self {
        self.script
            .lock()
            .expect("fixture script mutex poisoned")
            .push_back(outcome);
        self
    }

    /// Number of `fetch` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FixtureSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self, spec: &FetchSpec) -> Result<RawResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .script
            .lock()
            .expect("fixture script mutex poisoned")
            .pop_front();

        let outcome = match scripted {
            Some(outcome) => outcome,
            None => match &self.fallback {
                Some(payload) => FixtureOutcome::Ok(payload.clone()),
                // Loud by default: an exhausted script in a test is a
                // harness misconfiguration, not a silent success.
                None => FixtureOutcome::Transient("fixture script exhausted".to_string()),
            },
        };

        match outcome {
            FixtureOutcome::Ok(payload) => Ok(RawResult {
                source: self.id,
                kind: spec.kind,
                payload,
                fetched_at: Utc::now(),
            }),
            FixtureOutcome::Transient(reason) => Err(FetchError::transient(self.id, reason)),
            FixtureOutcome::Permanent(reason) => Err(FetchError::permanent(self.id, reason)),
        }
    }
}
