//! Ops/debug HTTP surface: health probe, cache statistics, breaker states.
//! The data itself is served to callers through the library API; this router
//! exists for operators and dashboards.

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::breaker::BreakerSnapshot;
use crate::cache::CacheStats;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/debug/cache-stats", get(cache_stats))
        .route("/debug/breakers", get(breakers))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache_stats().await)
}

async fn breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.orchestrator.breaker_snapshots())
}
