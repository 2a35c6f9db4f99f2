//! Runtime configuration: an explicit object handed to the orchestrator at
//! construction, with no ambient mutable globals.
//!
//! Layering: built-in defaults → optional TOML file
//! (`$ACQUIRE_CONFIG_PATH`, then `config/acquire.toml`) → `SMC_HOUSING_*`
//! environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::breaker::BreakerConfig;
use crate::model::DataKind;

pub const ENV_CONFIG_PATH: &str = "ACQUIRE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/acquire.toml";

/// Per-data-kind TTLs, in hours. These are the deployment-visible contract:
/// statistics churn daily, the limit tables change once a year, notices are
/// posted continuously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlSettings {
    pub statistics_hours: u64,
    pub income_limits_hours: u64,
    pub notices_hours: u64,
    pub funding_hours: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            statistics_hours: 24,
            income_limits_hours: 720,
            notices_hours: 6,
            funding_hours: 24,
        }
    }
}

impl TtlSettings {
    pub fn for_kind(&self, kind: DataKind) -> Duration {
        let hours = match kind {
            DataKind::Statistics => self.statistics_hours,
            DataKind::IncomeLimits => self.income_limits_hours,
            DataKind::Notices => self.notices_hours,
            DataKind::FundingDetails => self.funding_hours,
        };
        Duration::from_secs(hours.saturating_mul(3600))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per acquisition, the first one included.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierSettings {
    pub memory: bool,
    pub file: bool,
    /// LRU capacity of the memory tier; 0 means unbounded.
    pub memory_capacity: usize,
    pub file_dir: PathBuf,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            memory: true,
            file: true,
            memory_capacity: 256,
            file_dir: PathBuf::from("cache/housing_acquire"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "housing-acquire/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub ttl: TtlSettings,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
    pub tiers: TierSettings,
    pub http: HttpSettings,
}

impl AcquireConfig {
    /// Defaults → optional TOML file → environment overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            Self::load_from(Path::new(&path))?
        } else {
            let fallback = Path::new(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from(fallback)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `SMC_HOUSING_*` overrides, mirroring the knobs operators already set
    /// for the scraper deployment.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("SMC_HOUSING_CACHE_TTL") {
            self.ttl.statistics_hours = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_CACHE_TTL_INCOME_LIMITS") {
            self.ttl.income_limits_hours = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_CACHE_TTL_NOTICES") {
            self.ttl.notices_hours = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_MAX_RETRIES") {
            self.retry.max_retries = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_BREAKER_THRESHOLD") {
            self.breaker.failure_threshold = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_BREAKER_COOLDOWN_SECS") {
            self.breaker.cooldown_secs = v;
        }
        if let Some(v) = env_parse("SMC_HOUSING_REQUEST_TIMEOUT") {
            self.http.timeout_secs = v;
        }
        if let Ok(v) = std::env::var("SMC_HOUSING_USER_AGENT") {
            if !v.trim().is_empty() {
                self.http.user_agent = v;
            }
        }
        if let Ok(v) = std::env::var("SMC_HOUSING_CACHE_DIR") {
            if !v.trim().is_empty() {
                self.tiers.file_dir = PathBuf::from(v);
            }
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}
