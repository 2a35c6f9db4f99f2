//! Circuit-breaker isolation as seen through the executor: threshold opens
//! the circuit, open circuits fail fast without touching the adapter, and
//! the half-open probe decides between closing and re-opening.

use std::time::Duration;

use housing_acquire::breaker::{BreakerConfig, CircuitState};
use housing_acquire::config::RetrySettings;
use housing_acquire::executor::Executor;
use housing_acquire::model::{DataKind, FetchSpec, SourceId};
use housing_acquire::source::fixture::FixtureSource;
use housing_acquire::AcquireError;

const COOLDOWN: Duration = Duration::from_secs(60);

fn statistics_payload() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/dashboard.json")).expect("fixture json")
}

fn spec() -> FetchSpec {
    FetchSpec::new(SourceId::Dashboard, DataKind::Statistics)
}

/// No in-call retries, threshold 2: two failed acquisitions open the
/// circuit.
fn executor() -> Executor {
    Executor::new(
        RetrySettings {
            max_retries: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
        },
        BreakerConfig {
            failure_threshold: 2,
            cooldown: COOLDOWN,
        },
    )
}

async fn trip_breaker(exec: &Executor, source: &FixtureSource) {
    for _ in 0..2 {
        source.push_transient("down");
        let err = exec.acquire(source, &spec()).await.expect_err("failing");
        assert!(matches!(err, AcquireError::Fetch(_)));
    }
    assert_eq!(exec.breaker_snapshots()[0].state, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_fails_fast_without_touching_the_adapter() {
    let source = FixtureSource::new(SourceId::Dashboard);
    let exec = executor();
    trip_breaker(&exec, &source).await;
    assert_eq!(source.calls(), 2);

    let err = exec.acquire(&source, &spec()).await.expect_err("isolated");
    assert!(matches!(err, AcquireError::CircuitOpen { .. }));
    assert_eq!(source.calls(), 2, "adapter must not be invoked while open");
}

#[tokio::test(start_paused = true)]
async fn successful_probe_after_cooldown_closes_the_circuit() {
    let source = FixtureSource::new(SourceId::Dashboard);
    let exec = executor();
    trip_breaker(&exec, &source).await;

    tokio::time::advance(COOLDOWN + Duration::from_secs(1)).await;
    source.push_ok(statistics_payload());
    exec.acquire(&source, &spec()).await.expect("probe succeeds");

    let snapshot = &exec.breaker_snapshots()[0];
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);

    // And the source is back in rotation.
    source.push_ok(statistics_payload());
    exec.acquire(&source, &spec()).await.expect("circuit closed");
}

#[tokio::test(start_paused = true)]
async fn failed_probe_restarts_the_cooldown() {
    let source = FixtureSource::new(SourceId::Dashboard);
    let exec = executor();
    trip_breaker(&exec, &source).await;

    tokio::time::advance(COOLDOWN + Duration::from_secs(1)).await;
    source.push_transient("still down");
    let err = exec.acquire(&source, &spec()).await.expect_err("probe fails");
    assert!(matches!(err, AcquireError::Fetch(_)));
    assert_eq!(source.calls(), 3);
    assert_eq!(exec.breaker_snapshots()[0].state, CircuitState::Open);

    // Back to failing fast until the next cooldown elapses.
    let err = exec.acquire(&source, &spec()).await.expect_err("isolated");
    assert!(matches!(err, AcquireError::CircuitOpen { .. }));
    assert_eq!(source.calls(), 3);
}
