//! # Source adapters
//! The uniform "fetch raw data for a spec" capability, one implementation
//! per external resource family. Adapters must not retry internally:
//! backoff and failure accounting live in the executor so the circuit
//! breaker sees every attempt.

pub mod fixture;
pub mod http;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{FetchSpec, RawResult, SourceId};

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;
    async fn fetch(&self, spec: &FetchSpec) -> Result<RawResult, FetchError>;
}

/// Body → semi-structured payload hook. Real extractors (HTML scraping, PDF
/// table lifting) live outside this crate and plug in here; the shipped
/// [`http::JsonExtractor`] only handles JSON bodies.
pub trait Extract: Send + Sync {
    fn extract(&self, body: &str, spec: &FetchSpec) -> anyhow::Result<serde_json::Value>;
}
