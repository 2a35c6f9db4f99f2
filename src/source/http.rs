//! HTTP-backed source adapter for the county site.
//!
//! The adapter owns transport and error classification only; turning a body
//! into a structured payload is delegated to the injected [`Extract`]
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::StatusCode;

use crate::config::HttpSettings;
use crate::error::FetchError;
use crate::model::{FetchSpec, RawResult, SourceId};
use crate::source::{Extract, SourceAdapter};

/// Rendered affordable-housing dashboard.
pub const DASHBOARD_URL: &str = "https://www.smcgov.org/housing/doh-dashboards";
/// Income & rent limit documents, one per year (`{year}` placeholder).
pub const INCOME_LIMITS_PDF_URL: &str =
    "https://www.smcgov.org/housing/sites/smcgov.org/files/{year}%20Income%20%26%20Rent%20Limits.pdf";
/// Public notice listing pages.
pub const PUBLIC_NOTICES_URL: &str = "https://www.smcgov.org/housing/doh-public-notices";

pub struct HttpSource {
    id: SourceId,
    url_template: String,
    client: reqwest::Client,
    extractor: Arc<dyn Extract>,
}

impl HttpSource {
    pub fn new(
        id: SourceId,
        url_template: impl Into<String>,
        extractor: Arc<dyn Extract>,
        http: &HttpSettings,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self {
            id,
            url_template: url_template.into(),
            client,
            extractor,
        })
    }

    /// Substitute `{param}` placeholders from the spec into the template.
    fn resolve_url(&self, spec: &FetchSpec) -> String {
        let mut url = self.url_template.clone();
        for (key, value) in &spec.params {
            url = url.replace(&format!("{{{key}}}"), value);
        }
        url
    }

    fn classify_status(&self, status: StatusCode) -> FetchError {
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            FetchError::transient(self.id, format!("upstream status {status}"))
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            FetchError::permanent(self.id, format!("resource gone ({status})"))
        } else {
            FetchError::permanent(self.id, format!("unexpected status {status}"))
        }
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch(&self, spec: &FetchSpec) -> Result<RawResult, FetchError> {
        let url = self.resolve_url(spec);
        let fetched_at = Utc::now();

        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(source = %self.id, %url, error = %e, "http request failed");
                counter!("acquire_source_http_errors_total").increment(1);
                return Err(FetchError::transient(self.id, format!("request: {e}")));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("acquire_source_http_errors_total").increment(1);
            return Err(self.classify_status(status));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::transient(self.id, format!("reading body: {e}")))?;

        let payload = self.extractor.extract(&body, spec).map_err(|e| {
            // The page came back but we cannot make sense of it; a retry
            // would download the same bytes.
            FetchError::permanent(self.id, format!("extract: {e:#}"))
        })?;

        Ok(RawResult {
            source: self.id,
            kind: spec.kind,
            payload,
            fetched_at,
        })
    }
}

/// Passthrough extractor for endpoints that already serve JSON.
pub struct JsonExtractor;

impl Extract for JsonExtractor {
    fn extract(&self, body: &str, _spec: &FetchSpec) -> anyhow::Result<serde_json::Value> {
        use anyhow::Context;
        serde_json::from_str(body).context("parsing json body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataKind;

    #[test]
    fn url_template_substitutes_params() {
        let source = HttpSource::new(
            SourceId::IncomeLimitsPdf,
            INCOME_LIMITS_PDF_URL,
            Arc::new(JsonExtractor),
            &HttpSettings::default(),
        )
        .expect("client builds");
        let spec = FetchSpec::new(SourceId::IncomeLimitsPdf, DataKind::IncomeLimits)
            .with_param("year", "2025");
        assert_eq!(
            source.resolve_url(&spec),
            "https://www.smcgov.org/housing/sites/smcgov.org/files/2025%20Income%20%26%20Rent%20Limits.pdf"
        );
    }

    #[test]
    fn status_classification_follows_error_taxonomy() {
        let source = HttpSource::new(
            SourceId::Dashboard,
            DASHBOARD_URL,
            Arc::new(JsonExtractor),
            &HttpSettings::default(),
        )
        .expect("client builds");
        assert!(source
            .classify_status(StatusCode::SERVICE_UNAVAILABLE)
            .is_transient());
        assert!(source
            .classify_status(StatusCode::TOO_MANY_REQUESTS)
            .is_transient());
        assert!(!source.classify_status(StatusCode::NOT_FOUND).is_transient());
        assert!(!source.classify_status(StatusCode::FORBIDDEN).is_transient());
    }
}
