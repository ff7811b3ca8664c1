//! Per-Symbol Fetch Types
//!
//! A `FetchOutcome` is produced exactly once per requested symbol and is
//! consumed by the batch compiler. Failures are values, never errors that
//! unwind past the fetcher.

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::endpoint::EndpointKind;

/// Suggestion attached to bot-detection rejections.
pub const ACCESS_DENIED_SUGGESTION: &str = "The exchange is denying automated access. \
     Retry later or switch to the HTML scraping data source.";

/// One data request for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Symbol identifier as supplied by the caller.
    pub symbol: String,
    /// Endpoint the request targets.
    pub endpoint: EndpointKind,
}

impl FetchRequest {
    /// Create a new fetch request.
    #[must_use]
    pub fn new(symbol: impl Into<String>, endpoint: EndpointKind) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint,
        }
    }
}

/// Classification of a per-symbol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream answered with a non-2xx status. 401 means a bot-detection block.
    HttpStatus(u16),
    /// Transport-level failure, including per-item timeout.
    NetworkError,
    /// 2xx response whose body is not valid JSON.
    MalformedResponse,
    /// Global deadline passed before the symbol was attempted.
    ProcessingTimeout,
    /// No session could be established for an endpoint that requires one.
    SessionError,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::HttpStatus(_) => "HTTP_STATUS",
            Self::NetworkError => "NETWORK_ERROR",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::ProcessingTimeout => "PROCESSING_TIMEOUT",
            Self::SessionError => "SESSION_ERROR",
        }
    }

    /// Upstream HTTP status, if the failure carries one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether this is an upstream bot-detection block.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::HttpStatus(401))
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::HttpStatus(401) => "Access denied by upstream (HTTP 401)".to_string(),
            Self::HttpStatus(code) => format!("Upstream returned HTTP {code}"),
            Self::NetworkError => "Network error while contacting upstream".to_string(),
            Self::MalformedResponse => "Upstream returned a malformed response".to_string(),
            Self::ProcessingTimeout => "Processing deadline exceeded before fetch".to_string(),
            Self::SessionError => "Upstream session could not be established".to_string(),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Result of fetching one symbol. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Upstream returned a JSON document.
    Success {
        /// Symbol the payload belongs to.
        symbol: String,
        /// Opaque upstream document.
        payload: Value,
    },
    /// The symbol could not be fetched.
    Failure {
        /// Symbol that failed.
        symbol: String,
        /// Failure classification.
        kind: ErrorKind,
        /// Underlying detail (transport message, body excerpt, ...).
        detail: String,
        /// Optional remediation hint for the caller.
        suggestion: Option<String>,
    },
}

impl FetchOutcome {
    /// Successful outcome.
    #[must_use]
    pub fn success(symbol: impl Into<String>, payload: Value) -> Self {
        Self::Success {
            symbol: symbol.into(),
            payload,
        }
    }

    /// Failed outcome. A 401 automatically carries the access-denied suggestion.
    #[must_use]
    pub fn failure(symbol: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        let suggestion = kind
            .is_access_denied()
            .then(|| ACCESS_DENIED_SUGGESTION.to_string());
        Self::Failure {
            symbol: symbol.into(),
            kind,
            detail: detail.into(),
            suggestion,
        }
    }

    /// Symbol this outcome belongs to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Success { symbol, .. } | Self::Failure { symbol, .. } => symbol,
        }
    }

    /// Whether the fetch succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if this is a failure.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
