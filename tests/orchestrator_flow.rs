//! End-to-end behavior of the acquisition orchestrator:
//! - fresh cache hits never touch the source
//! - concurrent callers share one in-flight fetch
//! - failed fetches fall back to stale entries, or surface a kinded error
//! - forced refresh and caller wait timeouts
//!
//! Sources are scripted `FixtureSource`s; TTL-window scenarios seed the
//! memory tier with backdated entries instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use housing_acquire::cache::memory::MemoryTier;
use housing_acquire::cache::{CacheEntry, CacheTier};
use housing_acquire::error::FetchError;
use housing_acquire::model::{DataKind, FetchSpec, NormalizedRecord, RawResult, SourceId};
use housing_acquire::source::fixture::FixtureSource;
use housing_acquire::source::SourceAdapter;
use housing_acquire::validate;
use housing_acquire::{AcquireConfig, AcquireError, GetOptions, Orchestrator, Origin};

fn statistics_payload() -> Value {
    serde_json::from_str(include_str!("fixtures/dashboard.json")).expect("fixture json")
}

fn statistics_record() -> NormalizedRecord {
    validate::normalize(RawResult {
        source: SourceId::Dashboard,
        kind: DataKind::Statistics,
        payload: statistics_payload(),
        fetched_at: Utc::now(),
    })
    .expect("fixture payload validates")
}

fn spec() -> FetchSpec {
    FetchSpec::new(SourceId::Dashboard, DataKind::Statistics)
}

/// Short backoffs so retry paths finish quickly on real time.
fn fast_config() -> AcquireConfig {
    let mut cfg = AcquireConfig::default();
    cfg.retry.backoff_base_ms = 5;
    cfg.retry.backoff_max_ms = 20;
    cfg
}

/// Orchestrator over a single memory tier, with handles to both.
fn build(
    source: FixtureSource,
    cfg: AcquireConfig,
) -> (Orchestrator, Arc<FixtureSource>, Arc<MemoryTier>) {
    let source = Arc::new(source);
    let tier = Arc::new(MemoryTier::new(0));
    let orchestrator = Orchestrator::with_tiers(
        cfg,
        vec![source.clone() as Arc<dyn SourceAdapter>],
        vec![tier.clone() as Arc<dyn CacheTier>],
    );
    (orchestrator, source, tier)
}

#[tokio::test]
async fn fresh_hit_never_invokes_the_source() {
    let (orchestrator, source, _tier) =
        build(FixtureSource::new(SourceId::Dashboard).with_fallback(statistics_payload()),
              fast_config());

    let first = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(first.origin, Origin::Fresh);
    assert!(!first.from_cache);
    assert_eq!(source.calls(), 1);

    let second = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(second.origin, Origin::Fresh);
    assert!(second.from_cache);
    assert_eq!(source.calls(), 1, "fresh hit must not fetch");
    // Idempotence: repeated reads return the identical record and leave the
    // tier contents alone.
    assert_eq!(first.record, second.record);
    let stats = orchestrator.cache_stats().await;
    assert_eq!(stats.tiers[0].entries, 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let source = FixtureSource::new(SourceId::Dashboard)
        .with_fallback(statistics_payload())
        .with_delay(Duration::from_millis(50));
    let (orchestrator, source, _tier) = build(source, fast_config());

    let s = spec();
    let (a, b, c) = tokio::join!(
        orchestrator.get(&s, GetOptions::default()),
        orchestrator.get(&s, GetOptions::default()),
        orchestrator.get(&s, GetOptions::default()),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(source.calls(), 1, "single-flight must deduplicate the fetch");
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[tokio::test]
async fn concurrent_callers_share_retries_too() {
    // Source fails twice, then succeeds on the third attempt; three
    // concurrent callers must produce 3 adapter invocations total, not 9.
    let source = FixtureSource::new(SourceId::Dashboard).with_delay(Duration::from_millis(10));
    source.push_transient("flaky");
    source.push_transient("flaky again");
    source.push_ok(statistics_payload());
    let (orchestrator, source, _tier) = build(source, fast_config());

    let s = spec();
    let (a, b, c) = tokio::join!(
        orchestrator.get(&s, GetOptions::default()),
        orchestrator.get(&s, GetOptions::default()),
        orchestrator.get(&s, GetOptions::default()),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(source.calls(), 3);
    assert_eq!(a.origin, Origin::Fresh);
    assert_eq!(a.record, b.record);
    assert_eq!(b.record, c.record);
}

#[tokio::test]
async fn failed_fetch_serves_stale_entry() {
    let source = FixtureSource::new(SourceId::Dashboard);
    source.push_transient("down");
    source.push_transient("down");
    source.push_transient("down");
    let (orchestrator, source, tier) = build(source, fast_config());

    // Entry fetched 7 hours ago with a 6 hour TTL: present but stale.
    let record = statistics_record();
    let stale = CacheEntry::new_at(
        record.clone(),
        Duration::from_secs(6 * 3600),
        Utc::now() - chrono::Duration::hours(7),
    );
    tier.set(&spec().cache_key(), stale).await.unwrap();

    let out = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(out.origin, Origin::StaleFallback);
    assert!(out.from_cache);
    assert_eq!(out.record, record);
    assert_eq!(source.calls(), 3, "all retries spent before falling back");
}

#[tokio::test]
async fn ttl_window_scenario_six_hours() {
    // TTL 6h, fetched at T0: a call at T0+5h is fresh-from-cache, a call at
    // T0+7h with the source unreachable serves the same record stale.
    let source = FixtureSource::new(SourceId::Dashboard);
    source.push_transient("unreachable");
    source.push_transient("unreachable");
    source.push_transient("unreachable");
    let (orchestrator, source, tier) = build(source, fast_config());

    let record = statistics_record();
    let key = spec().cache_key();
    let ttl = Duration::from_secs(6 * 3600);

    tier.set(
        &key,
        CacheEntry::new_at(record.clone(), ttl, Utc::now() - chrono::Duration::hours(5)),
    )
    .await
    .unwrap();
    let at_5h = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(at_5h.origin, Origin::Fresh);
    assert!(at_5h.from_cache);
    assert_eq!(source.calls(), 0);

    tier.set(
        &key,
        CacheEntry::new_at(record.clone(), ttl, Utc::now() - chrono::Duration::hours(7)),
    )
    .await
    .unwrap();
    let at_7h = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(at_7h.origin, Origin::StaleFallback);
    assert_eq!(at_7h.record, record);
}

#[tokio::test]
async fn failure_with_no_cache_surfaces_the_error() {
    let source = FixtureSource::new(SourceId::Dashboard);
    source.push_permanent("page layout changed");
    let (orchestrator, source, _tier) = build(source, fast_config());

    let err = orchestrator
        .get(&spec(), GetOptions::default())
        .await
        .expect_err("no fallback exists");
    assert!(matches!(
        err,
        AcquireError::Fetch(FetchError::Permanent { .. })
    ));
    assert_eq!(source.calls(), 1, "permanent failures are not retried");
}

#[tokio::test]
async fn force_refresh_skips_the_fresh_short_circuit() {
    let (orchestrator, source, _tier) =
        build(FixtureSource::new(SourceId::Dashboard).with_fallback(statistics_payload()),
              fast_config());

    orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert_eq!(source.calls(), 1);

    let refreshed = orchestrator
        .get(
            &spec(),
            GetOptions {
                force_refresh: true,
                ..GetOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(refreshed.origin, Origin::Fresh);
    assert!(!refreshed.from_cache);
}

#[tokio::test]
async fn wait_timeout_bounds_the_caller_not_the_fetch() {
    let source = FixtureSource::new(SourceId::Dashboard)
        .with_fallback(statistics_payload())
        .with_delay(Duration::from_millis(100));
    let (orchestrator, source, _tier) = build(source, fast_config());

    let err = orchestrator
        .get(
            &spec(),
            GetOptions {
                wait_timeout: Some(Duration::from_millis(10)),
                ..GetOptions::default()
            },
        )
        .await
        .expect_err("caller wait is bounded");
    assert!(matches!(err, AcquireError::WaitTimeout { .. }));

    // The abandoned fetch keeps going and populates the cache.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let out = orchestrator.get(&spec(), GetOptions::default()).await.unwrap();
    assert!(out.from_cache);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn unknown_source_is_a_kinded_error() {
    let (orchestrator, _source, _tier) =
        build(FixtureSource::new(SourceId::Dashboard).with_fallback(statistics_payload()),
              fast_config());

    let err = orchestrator
        .get(
            &FetchSpec::new(SourceId::PublicNotices, DataKind::Notices),
            GetOptions::default(),
        )
        .await
        .expect_err("no notices adapter registered");
    assert!(matches!(
        err,
        AcquireError::UnknownSource(SourceId::PublicNotices)
    ));
}

#[tokio::test]
async fn per_call_ttl_override_is_respected() {
    let (orchestrator, _source, tier) =
        build(FixtureSource::new(SourceId::Dashboard).with_fallback(statistics_payload()),
              fast_config());

    orchestrator
        .get(
            &spec(),
            GetOptions {
                ttl: Some(Duration::from_secs(120)),
                ..GetOptions::default()
            },
        )
        .await
        .unwrap();

    let entry = tier
        .get(&spec().cache_key())
        .await
        .unwrap()
        .expect("entry written");
    assert_eq!(entry.ttl(), Duration::from_secs(120));
}
