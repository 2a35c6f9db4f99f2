// tests/api_http.rs
//
// HTTP-level tests for the ops Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /debug/cache-stats
// - GET /debug/breakers

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use housing_acquire::api::{self, AppState};
use housing_acquire::model::{DataKind, FetchSpec, SourceId};
use housing_acquire::source::fixture::FixtureSource;
use housing_acquire::source::SourceAdapter;
use housing_acquire::{AcquireConfig, GetOptions, Orchestrator};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn statistics_payload() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/dashboard.json")).expect("fixture json")
}

/// Orchestrator over the memory tier only, plus the router the binary uses.
fn test_app() -> (Orchestrator, Router) {
    let mut cfg = AcquireConfig::default();
    cfg.tiers.file = false;
    let source =
        Arc::new(FixtureSource::new(SourceId::Dashboard).with_fallback(statistics_payload()));
    let orchestrator = Orchestrator::new(cfg, vec![source as Arc<dyn SourceAdapter>]);
    let router = api::create_router(AppState {
        orchestrator: orchestrator.clone(),
    });
    (orchestrator, router)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let (_orchestrator, app) = test_app();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn cache_stats_reports_tier_contents() {
    let (orchestrator, app) = test_app();

    let (status, before) = get_json(&app, "/debug/cache-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["tiers"][0]["tier"], "memory");
    assert_eq!(before["tiers"][0]["entries"], 0);

    orchestrator
        .get(
            &FetchSpec::new(SourceId::Dashboard, DataKind::Statistics),
            GetOptions::default(),
        )
        .await
        .expect("acquisition succeeds");

    let (_, after) = get_json(&app, "/debug/cache-stats").await;
    assert_eq!(after["tiers"][0]["entries"], 1);
}

#[tokio::test]
async fn breakers_report_per_source_state() {
    let (orchestrator, app) = test_app();

    let (status, before) = get_json(&app, "/debug/breakers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before, serde_json::json!([]));

    orchestrator
        .get(
            &FetchSpec::new(SourceId::Dashboard, DataKind::Statistics),
            GetOptions::default(),
        )
        .await
        .expect("acquisition succeeds");

    let (_, after) = get_json(&app, "/debug/breakers").await;
    assert_eq!(after[0]["source"], "dashboard");
    assert_eq!(after[0]["state"], "closed");
    assert_eq!(after[0]["consecutive_failures"], 0);
}
