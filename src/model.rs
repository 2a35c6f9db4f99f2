//! # Data model
//! Canonical record types for the county housing data set, plus the
//! identifiers the acquisition pipeline is keyed by: `DataKind`, `SourceId`,
//! `FetchSpec`, and the derived `CacheKey`.
//!
//! Records are produced by the validator and are read-only for callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Logical kind of data a caller can ask for. Each kind carries its own
/// payload schema version and default TTL (see `AcquireConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Statistics,
    IncomeLimits,
    Notices,
    FundingDetails,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Statistics,
        DataKind::IncomeLimits,
        DataKind::Notices,
        DataKind::FundingDetails,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Statistics => "statistics",
            DataKind::IncomeLimits => "income_limits",
            DataKind::Notices => "notices",
            DataKind::FundingDetails => "funding_details",
        }
    }

    /// Schema version the validator expects in raw payloads of this kind.
    pub fn schema_version(&self) -> u32 {
        match self {
            DataKind::Statistics => 1,
            DataKind::IncomeLimits => 1,
            DataKind::Notices => 1,
            DataKind::FundingDetails => 1,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External resource family a fetch goes against: the rendered dashboard,
/// the downloadable income/rent limit documents, or the notice listing pages.
/// The orchestrator never branches on the variant; it only routes to the
/// registered adapter and distinguishes error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Dashboard,
    IncomeLimitsPdf,
    PublicNotices,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [
        SourceId::Dashboard,
        SourceId::IncomeLimitsPdf,
        SourceId::PublicNotices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Dashboard => "dashboard",
            SourceId::IncomeLimitsPdf => "income_limits_pdf",
            SourceId::PublicNotices => "public_notices",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to fetch and from where. Immutable once constructed; parameters live
/// in a `BTreeMap` so their ordering (and therefore the derived cache key)
/// is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub source: SourceId,
    pub kind: DataKind,
    pub params: BTreeMap<String, String>,
}

impl FetchSpec {
    pub fn new(source: SourceId, kind: DataKind) -> Self {
        Self {
            source,
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The cache key this spec resolves to. Equal specs always yield equal
    /// keys; the key ignores `source` so a migrated source keeps its cache.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_parts(self.kind, &self.params)
    }
}

/// Opaque cache identifier, deterministically derived from
/// `(data kind, sorted query parameters)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_parts(kind: DataKind, params: &BTreeMap<String, String>) -> Self {
        let mut out = format!("smc_housing:{}", kind.as_str());
        for (k, v) in params {
            out.push(':');
            out.push_str(k);
            out.push(':');
            out.push_str(v);
        }
        CacheKey(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 hex fingerprint; filesystem-safe (file tier names).
    pub fn digest(&self) -> String {
        use std::fmt::Write;

        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let bytes = hasher.finalize();
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        hex
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw adapter output: the semi-structured payload an extractor produced,
/// before validation. The payload is JSON-shaped by contract; what it means
/// is only decided by the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub source: SourceId,
    pub kind: DataKind,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

// ---- Canonical records -----------------------------------------------------

/// Snapshot of the affordable-housing dashboard figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingStatistics {
    pub total_affordable_units: u32,
    pub total_projects: u32,
    pub county_funding_millions: f64,
    pub federal_funding_millions: f64,
    pub units_by_status: BTreeMap<String, u32>,
    pub units_by_city: BTreeMap<String, u32>,
    pub last_updated: DateTime<Utc>,
}

/// One income/rent limit row for a given year and family size. AMI bands are
/// optional because older documents omit some columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeLimitRow {
    pub year: i32,
    pub family_size: u8,
    pub ami_30_percent: Option<f64>,
    pub ami_50_percent: Option<f64>,
    pub ami_80_percent: Option<f64>,
    pub ami_120_percent: Option<f64>,
    pub max_rent_30: Option<f64>,
    pub max_rent_50: Option<f64>,
    pub max_rent_80: Option<f64>,
}

impl IncomeLimitRow {
    /// Income ceiling for the given AMI band, when the document carries it.
    pub fn ami_limit(&self, category: AmiCategory) -> Option<f64> {
        match category {
            AmiCategory::Ami30 => self.ami_30_percent,
            AmiCategory::Ami50 => self.ami_50_percent,
            AmiCategory::Ami80 => self.ami_80_percent,
            AmiCategory::Ami120 => self.ami_120_percent,
        }
    }

    /// Max affordable rent for the band; the 120% band has no rent column.
    pub fn max_rent(&self, category: AmiCategory) -> Option<f64> {
        match category {
            AmiCategory::Ami30 => self.max_rent_30,
            AmiCategory::Ami50 => self.max_rent_50,
            AmiCategory::Ami80 => self.max_rent_80,
            AmiCategory::Ami120 => None,
        }
    }
}

/// AMI percentage band used by eligibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmiCategory {
    #[serde(rename = "30%")]
    Ami30,
    #[serde(rename = "50%")]
    Ami50,
    #[serde(rename = "80%")]
    Ami80,
    #[serde(rename = "120%")]
    Ami120,
}

impl AmiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmiCategory::Ami30 => "30%",
            AmiCategory::Ami50 => "50%",
            AmiCategory::Ami80 => "80%",
            AmiCategory::Ami120 => "120%",
        }
    }
}

impl fmt::Display for AmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published notice from the listing pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicNotice {
    pub title: String,
    #[serde(default)]
    pub date_published: Option<DateTime<Utc>>,
    pub notice_type: String,
    pub content_url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Funding breakdown from the dashboard's funding panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingDetails {
    pub county_funding_millions: f64,
    pub federal_funding_millions: f64,
    #[serde(default)]
    pub measure_k_leverage_millions: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// A validated, canonical record of one data kind. The schema version rides
/// along so downstream consumers can reject shapes they do not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub schema_version: u32,
    pub body: RecordBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    Statistics(HousingStatistics),
    IncomeLimits { rows: Vec<IncomeLimitRow> },
    Notices { notices: Vec<PublicNotice> },
    FundingDetails(FundingDetails),
}

impl NormalizedRecord {
    pub fn kind(&self) -> DataKind {
        match self.body {
            RecordBody::Statistics(_) => DataKind::Statistics,
            RecordBody::IncomeLimits { .. } => DataKind::IncomeLimits,
            RecordBody::Notices { .. } => DataKind::Notices,
            RecordBody::FundingDetails(_) => DataKind::FundingDetails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_specs_yield_equal_keys() {
        let a = FetchSpec::new(SourceId::IncomeLimitsPdf, DataKind::IncomeLimits)
            .with_param("year", "2025")
            .with_param("family_size", "4");
        let b = FetchSpec::new(SourceId::IncomeLimitsPdf, DataKind::IncomeLimits)
            .with_param("family_size", "4")
            .with_param("year", "2025");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key().digest(), b.cache_key().digest());
    }

    #[test]
    fn key_encodes_kind_and_params() {
        let spec = FetchSpec::new(SourceId::PublicNotices, DataKind::Notices)
            .with_param("limit", "10");
        assert_eq!(spec.cache_key().as_str(), "smc_housing:notices:limit:10");
    }

    #[test]
    fn digest_is_hex_sha256() {
        let key = FetchSpec::new(SourceId::Dashboard, DataKind::Statistics).cache_key();
        let digest = key.digest();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn record_body_round_trips_with_kind_tag() {
        let record = NormalizedRecord {
            schema_version: 1,
            body: RecordBody::IncomeLimits {
                rows: vec![IncomeLimitRow {
                    year: 2025,
                    family_size: 2,
                    ami_30_percent: Some(40_000.0),
                    ami_50_percent: Some(66_000.0),
                    ami_80_percent: Some(104_000.0),
                    ami_120_percent: Some(156_000.0),
                    max_rent_30: Some(1_000.0),
                    max_rent_50: Some(1_650.0),
                    max_rent_80: Some(2_600.0),
                }],
            },
        };
        let json = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(json["body"]["kind"], "income_limits");
        let back: NormalizedRecord = serde_json::from_value(json).expect("deserialize record");
        assert_eq!(back, record);
        assert_eq!(back.kind(), DataKind::IncomeLimits);
    }
}
