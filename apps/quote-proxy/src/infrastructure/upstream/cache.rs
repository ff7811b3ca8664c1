//! Session Reuse
//!
//! Wraps a [`SessionProvider`] and hands out the last established session
//! until it ages past the TTL or is invalidated after an upstream rejection.
//! The cached value lives in this provider instance; nothing is global.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::application::ports::{SessionError, SessionProvider};
use crate::domain::session::SessionContext;

/// Session provider that reuses sessions for a bounded time.
pub struct CachedSessionProvider {
    inner: Arc<dyn SessionProvider>,
    ttl: Duration,
    cached: Mutex<Option<SessionContext>>,
}

impl CachedSessionProvider {
    /// Wrap `inner`, reusing its sessions for up to `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn SessionProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    fn fresh_session(&self) -> Option<SessionContext> {
        let cached = self.cached.lock();
        let session = cached.as_ref()?;
        let age = Utc::now()
            .signed_duration_since(session.established_at())
            .to_std()
            .unwrap_or_default();
        (age < self.ttl).then(|| session.clone())
    }
}

impl std::fmt::Debug for CachedSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSessionProvider")
            .field("ttl", &self.ttl)
            .field("cached", &self.cached.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for CachedSessionProvider {
    async fn establish(&self) -> Result<SessionContext, SessionError> {
        if let Some(session) = self.fresh_session() {
            tracing::debug!(credentials = session.len(), "Reusing cached upstream session");
            return Ok(session);
        }

        let session = self.inner.establish().await?;
        *self.cached.lock() = Some(session.clone());
        Ok(session)
    }

    fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            tracing::info!("Cached upstream session invalidated");
        }
        self.inner.invalidate();
    }
}
