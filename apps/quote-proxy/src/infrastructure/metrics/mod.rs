//! Prometheus Metrics Module
//!
//! Exposes proxy metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Batches**: Completed batches by endpoint and overall status
//! - **Fetches**: Per-symbol outcomes by endpoint and error kind
//! - **Sessions**: Session establishment attempts by result
//! - **Latency**: Batch wall-clock duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the proxy port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::batch::BatchStatus;
use crate::domain::endpoint::EndpointKind;
use crate::domain::fetch::ErrorKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "quote_proxy_batches_total",
        "Total batches completed, by endpoint and status"
    );
    describe_counter!(
        "quote_proxy_windows_total",
        "Total concurrency windows dispatched"
    );
    describe_counter!(
        "quote_proxy_fetches_total",
        "Total per-symbol fetch outcomes, by endpoint and result"
    );
    describe_counter!(
        "quote_proxy_session_attempts_total",
        "Total session establishment attempts, by result"
    );
    describe_histogram!(
        "quote_proxy_batch_duration_seconds",
        "Wall-clock time to run a batch"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Session attempt result label.
#[derive(Debug, Clone, Copy)]
pub enum SessionAttemptResult {
    /// Credentials were obtained.
    Established,
    /// The attempt failed and may be retried.
    Failed,
}

impl SessionAttemptResult {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Established => "established",
            Self::Failed => "failed",
        }
    }
}

fn outcome_label(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        None => "success",
        Some(ErrorKind::HttpStatus(401)) => "access_denied",
        Some(ErrorKind::HttpStatus(_)) => "http_status",
        Some(ErrorKind::NetworkError) => "network_error",
        Some(ErrorKind::MalformedResponse) => "malformed_response",
        Some(ErrorKind::ProcessingTimeout) => "processing_timeout",
        Some(ErrorKind::SessionError) => "session_error",
    }
}

/// Record a completed batch.
pub fn record_batch(endpoint: EndpointKind, status: BatchStatus, duration: Duration) {
    counter!(
        "quote_proxy_batches_total",
        "endpoint" => endpoint.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
    histogram!(
        "quote_proxy_batch_duration_seconds",
        "endpoint" => endpoint.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a dispatched window.
pub fn record_window(endpoint: EndpointKind) {
    counter!(
        "quote_proxy_windows_total",
        "endpoint" => endpoint.as_str()
    )
    .increment(1);
}

/// Record one per-symbol fetch outcome. `None` means success.
pub fn record_fetch_outcome(endpoint: EndpointKind, kind: Option<ErrorKind>) {
    counter!(
        "quote_proxy_fetches_total",
        "endpoint" => endpoint.as_str(),
        "result" => outcome_label(kind)
    )
    .increment(1);
}

/// Record a session establishment attempt.
pub fn record_session_attempt(result: SessionAttemptResult) {
    counter!(
        "quote_proxy_session_attempts_total",
        "result" => result.as_str()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label(None), "success");
        assert_eq!(
            outcome_label(Some(ErrorKind::HttpStatus(401))),
            "access_denied"
        );
        assert_eq!(outcome_label(Some(ErrorKind::HttpStatus(502))), "http_status");
        assert_eq!(
            outcome_label(Some(ErrorKind::ProcessingTimeout)),
            "processing_timeout"
        );
    }

    #[test]
    fn session_attempt_labels() {
        assert_eq!(SessionAttemptResult::Established.as_str(), "established");
        assert_eq!(SessionAttemptResult::Failed.as_str(), "failed");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_batch(
            EndpointKind::Quote,
            BatchStatus::CompleteSuccess,
            Duration::from_millis(5),
        );
        record_window(EndpointKind::Chart);
        record_fetch_outcome(EndpointKind::Quote, Some(ErrorKind::NetworkError));
        record_session_attempt(SessionAttemptResult::Failed);
    }
}
