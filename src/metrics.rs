use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "acquire_cache_hits_total",
            "Fresh cache hits served without touching a source."
        );
        describe_counter!("acquire_cache_misses_total", "Lookups with no fresh entry.");
        describe_counter!(
            "acquire_stale_fallback_total",
            "Failed fetches answered from a stale cache entry."
        );
        describe_counter!(
            "acquire_singleflight_joins_total",
            "Callers that attached to an already in-flight fetch."
        );
        describe_counter!(
            "acquire_fetch_attempts_total",
            "Source adapter invocations, retries included."
        );
        describe_counter!(
            "acquire_fetch_failures_total",
            "Source adapter invocations that failed."
        );
        describe_counter!(
            "acquire_validation_failures_total",
            "Raw payloads rejected by the validator."
        );
        describe_counter!(
            "acquire_breaker_open_total",
            "Circuit breaker open transitions."
        );
        describe_counter!(
            "acquire_tier_unavailable_total",
            "Cache tier operations skipped due to tier outage."
        );
        describe_counter!(
            "acquire_errors_total",
            "Acquisitions that failed with no cached fallback."
        );
        describe_counter!("acquire_refresh_runs_total", "Background refresh sweeps.");
        describe_counter!(
            "acquire_source_http_errors_total",
            "HTTP-level failures talking to the county site."
        );
        describe_histogram!("acquire_fetch_ms", "Source fetch time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register series descriptions.
    pub fn init() -> Self {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");
        describe_metrics();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
