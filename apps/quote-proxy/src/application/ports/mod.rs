//! Port Interfaces
//!
//! Defines the interfaces (ports) for the upstream exchange following the
//! Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SessionProvider`: Acquires the credential bundle the upstream requires
//! - `QuoteFetcher`: Fetches one symbol using an established session

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::fetch::{FetchOutcome, FetchRequest};
use crate::domain::session::SessionContext;

/// Errors raised while establishing an upstream session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A navigation step answered with a non-2xx status.
    #[error("navigation to {url} returned HTTP {status}")]
    NavigationStatus {
        /// URL of the failing step.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// A navigation step failed at the transport level.
    #[error("navigation to {url} failed: {message}")]
    Network {
        /// URL of the failing step.
        url: String,
        /// Transport error message.
        message: String,
    },

    /// The sequence completed but the upstream issued no credentials.
    #[error("navigation sequence completed without issuing any credentials")]
    NoCredentials,

    /// A single attempt exceeded the sequence timeout.
    #[error("navigation sequence timed out after {}ms", .0.as_millis())]
    SequenceTimeout(Duration),

    /// The batch deadline passed while the session was being established.
    #[error("batch deadline passed during session establishment")]
    DeadlineExceeded,

    /// Every attempt failed; carries the last error observed.
    #[error("session establishment failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        last: Box<SessionError>,
    },
}

/// Acquires a session credential bundle from the upstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Establish (or hand out) a session for one batch run.
    async fn establish(&self) -> Result<SessionContext, SessionError>;

    /// Drop any session kept for reuse, e.g. after the upstream rejected it.
    fn invalidate(&self) {}
}

/// Fetches one symbol from the upstream.
///
/// Implementations never fail past this boundary: every error is captured
/// into `FetchOutcome::Failure`.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Fetch a single symbol using the shared session.
    async fn fetch_one(&self, request: &FetchRequest, session: &SessionContext) -> FetchOutcome;
}
