//! Error taxonomy for the acquisition pipeline.
//!
//! The kinds are deliberately coarse: the orchestrator's stale-fallback
//! decision is a pure function of the kind, never of adapter internals.
//! Everything here is `Clone` so a single outcome can be broadcast to every
//! single-flight waiter.

use thiserror::Error;

use crate::model::{CacheKey, DataKind, SourceId};

/// Failure reported by a source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network-shaped trouble: timeouts, resets, rate limiting, upstream
    /// 5xx. Worth retrying.
    #[error("transient fetch failure from {source_id}: {reason}")]
    Transient { source_id: SourceId, reason: String },
    /// The resource is gone or its format is unrecognizable. Retrying will
    /// not help.
    #[error("permanent fetch failure from {source_id}: {reason}")]
    Permanent { source_id: SourceId, reason: String },
}

impl FetchError {
    pub fn transient(source_id: SourceId, reason: impl Into<String>) -> Self {
        FetchError::Transient {
            source_id,
            reason: reason.into(),
        }
    }

    pub fn permanent(source_id: SourceId, reason: impl Into<String>) -> Self {
        FetchError::Permanent {
            source_id,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn source_id(&self) -> SourceId {
        match self {
            FetchError::Transient { source_id, .. } | FetchError::Permanent { source_id, .. } => {
                *source_id
            }
        }
    }
}

/// Raw payload rejected by the validator. Never retried: a malformed payload
/// stays malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind}: missing required field `{field}`")]
    MissingField { kind: DataKind, field: &'static str },
    #[error("{kind}: field `{field}` out of range: {detail}")]
    OutOfRange {
        kind: DataKind,
        field: &'static str,
        detail: String,
    },
    #[error("{kind}: unexpected structure: {detail}")]
    UnexpectedStructure { kind: DataKind, detail: String },
    #[error("{kind}: payload schema version {got}, expected {expected}")]
    SchemaVersion { kind: DataKind, got: u32, expected: u32 },
}

/// Terminal acquisition failure, surfaced to callers only after the
/// stale-fallback lookup came up empty. Callers never see retry counts or
/// breaker internals beyond these kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The breaker is isolating this source; the adapter was not invoked.
    #[error("circuit open for {source_id}; retry in ~{retry_in_secs}s")]
    CircuitOpen {
        source_id: SourceId,
        retry_in_secs: u64,
    },
    #[error("no adapter registered for source {0}")]
    UnknownSource(SourceId),
    /// This caller's wait on the in-flight fetch timed out. The fetch keeps
    /// running for other waiters and still populates the cache.
    #[error("timed out waiting for in-flight fetch of {key}")]
    WaitTimeout { key: CacheKey },
    /// The in-flight fetch terminated without publishing a result (task
    /// aborted at runtime shutdown).
    #[error("in-flight fetch for {key} ended without a result")]
    Interrupted { key: CacheKey },
}

impl AcquireError {
    /// Whether a stale cache entry may stand in for this failure. True for
    /// every source-side condition; false for caller-side ones where a
    /// result may still arrive (timeout) or the request itself is wrong.
    pub fn allows_stale_fallback(&self) -> bool {
        matches!(
            self,
            AcquireError::Fetch(_)
                | AcquireError::Validation(_)
                | AcquireError::CircuitOpen { .. }
        )
    }
}
