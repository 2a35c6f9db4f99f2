//! Housing acquisition service binary entrypoint.
//! Boots tracing, configuration, a demo-wired orchestrator, the background
//! refresher, and the ops HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use housing_acquire::api::{self, AppState};
use housing_acquire::metrics::Metrics;
use housing_acquire::model::{DataKind, FetchSpec, SourceId};
use housing_acquire::scheduler::{self, RefreshCfg};
use housing_acquire::source::fixture::FixtureSource;
use housing_acquire::source::SourceAdapter;
use housing_acquire::{AcquireConfig, Orchestrator};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("housing_acquire=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Embedded sample payloads stand in for the real extractor collaborators.
/// Swap these for `source::http::HttpSource` instances wired to extractors
/// to go against the live county site.
fn demo_sources() -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let dashboard: serde_json::Value =
        serde_json::from_str(include_str!("../tests/fixtures/dashboard.json"))
            .context("embedded dashboard fixture")?;
    let income_limits: serde_json::Value =
        serde_json::from_str(include_str!("../tests/fixtures/income_limits.json"))
            .context("embedded income limits fixture")?;
    let notices: serde_json::Value =
        serde_json::from_str(include_str!("../tests/fixtures/notices.json"))
            .context("embedded notices fixture")?;

    Ok(vec![
        // The dashboard payload carries the funding panel too, so one
        // fixture serves both the statistics and funding kinds.
        Arc::new(FixtureSource::new(SourceId::Dashboard).with_fallback(dashboard))
            as Arc<dyn SourceAdapter>,
        Arc::new(FixtureSource::new(SourceId::IncomeLimitsPdf).with_fallback(income_limits)),
        Arc::new(FixtureSource::new(SourceId::PublicNotices).with_fallback(notices)),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AcquireConfig::load_default()?;
    let metrics = Metrics::init();

    let orchestrator = Orchestrator::new(cfg, demo_sources()?);

    scheduler::spawn_refresh(
        orchestrator.clone(),
        RefreshCfg {
            interval: Duration::from_secs(15 * 60),
            specs: vec![
                FetchSpec::new(SourceId::Dashboard, DataKind::Statistics),
                FetchSpec::new(SourceId::Dashboard, DataKind::FundingDetails),
                FetchSpec::new(SourceId::IncomeLimitsPdf, DataKind::IncomeLimits)
                    .with_param("year", "2025"),
                FetchSpec::new(SourceId::PublicNotices, DataKind::Notices),
            ],
        },
    );

    let app = api::create_router(AppState { orchestrator }).merge(metrics.router());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()
        .context("parsing BIND_ADDR")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "serving ops api");
    axum::serve(listener, app).await.context("serving ops api")?;
    Ok(())
}
