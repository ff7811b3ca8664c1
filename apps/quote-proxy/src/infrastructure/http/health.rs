//! Health Check and Metrics Endpoints
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status with batch counters
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::domain::batch::BatchStatus;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: &'static str,
    /// Proxy version.
    pub version: String,
    /// Upstream source label.
    pub source: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Batches served since start.
    pub batches: BatchCounts,
}

/// Batch counters by overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    /// Total batches compiled.
    pub total: u64,
    /// Batches where every symbol succeeded.
    pub complete_success: u64,
    /// Batches with mixed results.
    pub partial_success: u64,
    /// Batches where every symbol failed.
    pub total_failure: u64,
}

// =============================================================================
// Health State
// =============================================================================

/// Process-level counters reported by `/health`.
#[derive(Debug)]
pub struct HealthState {
    version: String,
    started_at: Instant,
    complete_success: AtomicU64,
    partial_success: AtomicU64,
    total_failure: AtomicU64,
}

impl HealthState {
    /// Create new health state.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            complete_success: AtomicU64::new(0),
            partial_success: AtomicU64::new(0),
            total_failure: AtomicU64::new(0),
        }
    }

    /// Count a compiled batch.
    pub fn record_batch(&self, status: BatchStatus) {
        let counter = match status {
            BatchStatus::CompleteSuccess => &self.complete_success,
            BatchStatus::PartialSuccess => &self.partial_success,
            BatchStatus::TotalFailure => &self.total_failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the batch counters.
    #[must_use]
    pub fn batch_counts(&self) -> BatchCounts {
        let complete_success = self.complete_success.load(Ordering::Relaxed);
        let partial_success = self.partial_success.load(Ordering::Relaxed);
        let total_failure = self.total_failure.load(Ordering::Relaxed);
        BatchCounts {
            total: complete_success + partial_success + total_failure,
            complete_success,
            partial_success,
            total_failure,
        }
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

pub(super) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = &state.health;
    Json(HealthResponse {
        status: "healthy",
        version: health.version.clone(),
        source: state.orchestrator.settings().source_label.clone(),
        uptime_secs: health.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        batches: health.batch_counts(),
    })
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

// =============================================================================
// Tests
// =============================================================================
