//! Session Credential Bundle
//!
//! A `SessionContext` holds the cookies and tokens the upstream requires
//! before it treats a data request as browser-originated. It is immutable
//! once built and shared read-only by every fetch in a batch.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Immutable credential bundle plus its establishment timestamp.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    credentials: BTreeMap<String, String>,
    established_at: DateTime<Utc>,
}

impl SessionContext {
    /// Build a session from accumulated credentials, stamped now.
    #[must_use]
    pub fn new(credentials: BTreeMap<String, String>) -> Self {
        Self::with_timestamp(credentials, Utc::now())
    }

    /// Build a session with an explicit establishment time.
    #[must_use]
    pub const fn with_timestamp(
        credentials: BTreeMap<String, String>,
        established_at: DateTime<Utc>,
    ) -> Self {
        Self {
            credentials,
            established_at,
        }
    }

    /// Session with no credentials, used for degraded continuation.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    /// Whether the bundle carries no credentials at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Number of credentials held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Look up a single credential value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.credentials.get(name).map(String::as_str)
    }

    /// Credential names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.credentials.keys().map(String::as_str)
    }

    /// When the session was established.
    #[must_use]
    pub const fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Render the credentials as a `Cookie` request header value.
    ///
    /// Returns `None` for an empty session so callers omit the header.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.credentials.is_empty() {
            return None;
        }
        Some(
            self.credentials
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("credentials", &self.names().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .field("established_at", &self.established_at)
            .finish()
    }
}
