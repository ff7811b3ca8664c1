//! Batch Result Compilation
//!
//! Reduces the per-symbol outcome list into the keyed result returned to
//! callers. Compilation is pure: it depends only on the outcomes and the
//! request metadata handed in.
//!
//! # Invariant
//!
//! `data` keys and `errors` keys are disjoint and their union is exactly the
//! requested (deduplicated) symbol set. Outcomes for symbols that were never
//! requested are dropped; requested symbols without an outcome are reported
//! as processing timeouts.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::endpoint::EndpointKind;
use super::fetch::{ErrorKind, FetchOutcome};

/// Overall outcome of a batch, a pure function of success/failure counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every requested symbol succeeded.
    CompleteSuccess,
    /// At least one success and at least one failure.
    PartialSuccess,
    /// No symbol succeeded.
    TotalFailure,
}

impl BatchStatus {
    /// Select the status from outcome counts.
    ///
    /// An empty batch counts as a complete success; the orchestrator never
    /// produces one.
    #[must_use]
    pub const fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::CompleteSuccess,
            (0, _) => Self::TotalFailure,
            _ => Self::PartialSuccess,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CompleteSuccess => "complete_success",
            Self::PartialSuccess => "partial_success",
            Self::TotalFailure => "total_failure",
        }
    }
}

/// Per-symbol error entry in the compiled result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolError {
    /// Human-readable error summary.
    pub error: String,
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Upstream HTTP status, when the failure carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Underlying detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl SymbolError {
    fn new(kind: ErrorKind, detail: String, suggestion: Option<String>) -> Self {
        Self {
            error: kind.summary(),
            kind,
            status: kind.status(),
            details: (!detail.is_empty()).then_some(detail),
            suggestion,
        }
    }
}

/// Metadata describing the batch run, supplied by the orchestrator.
#[derive(Debug, Clone)]
pub struct BatchRequestMeta {
    /// Correlation ID for this batch.
    pub batch_id: Uuid,
    /// Endpoint kind that was fetched.
    pub endpoint: EndpointKind,
    /// Label naming the upstream data source.
    pub source: String,
    /// Requested symbols, already deduplicated.
    pub symbols: Vec<String>,
    /// Whether a non-empty session was established.
    pub session_established: bool,
    /// Wall-clock time the batch took.
    pub elapsed: Duration,
}

/// Summary block of a compiled batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMeta {
    /// Correlation ID for this batch.
    pub batch_id: Uuid,
    /// Endpoint kind that was fetched.
    pub endpoint: EndpointKind,
    /// Label naming the upstream data source.
    pub source: String,
    /// Number of distinct symbols requested.
    pub requested: usize,
    /// Number of symbols that succeeded.
    pub succeeded: usize,
    /// Number of symbols that failed.
    pub failed: usize,
    /// Overall status.
    pub status: BatchStatus,
    /// Whether a non-empty session was established.
    pub session_established: bool,
    /// Elapsed wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// When the result was compiled.
    pub timestamp: DateTime<Utc>,
}

/// Compiled batch result, keyed by symbol.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Summary block.
    pub meta: BatchMeta,
    /// Successful payloads by symbol.
    pub data: BTreeMap<String, Value>,
    /// Failures by symbol.
    pub errors: BTreeMap<String, SymbolError>,
}

impl BatchResult {
    /// Overall status of the batch.
    #[must_use]
    pub const fn status(&self) -> BatchStatus {
        self.meta.status
    }

    /// Whether any failure was a bot-detection block.
    #[must_use]
    pub fn has_access_denied(&self) -> bool {
        self.errors.values().any(|e| e.kind.is_access_denied())
    }
}

/// Compile per-symbol outcomes into a keyed batch result.
#[must_use]
pub fn compile(outcomes: Vec<FetchOutcome>, request: BatchRequestMeta) -> BatchResult {
    let requested: HashSet<&str> = request.symbols.iter().map(String::as_str).collect();
    let mut data: BTreeMap<String, Value> = BTreeMap::new();
    let mut errors: BTreeMap<String, SymbolError> = BTreeMap::new();

    for outcome in outcomes {
        if !requested.contains(outcome.symbol())
            || data.contains_key(outcome.symbol())
            || errors.contains_key(outcome.symbol())
        {
            tracing::debug!(symbol = outcome.symbol(), "Ignoring surplus outcome");
            continue;
        }

        match outcome {
            FetchOutcome::Success { symbol, payload } => {
                data.insert(symbol, payload);
            }
            FetchOutcome::Failure {
                symbol,
                kind,
                detail,
                suggestion,
            } => {
                errors.insert(symbol, SymbolError::new(kind, detail, suggestion));
            }
        }
    }

    for symbol in &request.symbols {
        if !data.contains_key(symbol) && !errors.contains_key(symbol) {
            errors.insert(
                symbol.clone(),
                SymbolError::new(
                    ErrorKind::ProcessingTimeout,
                    "no outcome was recorded for this symbol".to_string(),
                    None,
                ),
            );
        }
    }

    let succeeded = data.len();
    let failed = errors.len();

    BatchResult {
        meta: BatchMeta {
            batch_id: request.batch_id,
            endpoint: request.endpoint,
            source: request.source,
            requested: request.symbols.len(),
            succeeded,
            failed,
            status: BatchStatus::from_counts(succeeded, failed),
            session_established: request.session_established,
            elapsed_ms: u64::try_from(request.elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        },
        data,
        errors,
    }
}
