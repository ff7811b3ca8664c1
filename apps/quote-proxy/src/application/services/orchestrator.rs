//! Batch Orchestrator
//!
//! Runs one batch of symbol fetches against the upstream:
//!
//! ```text
//! Idle ──► SessionPending ──► Windowing ──► Done
//!                                 │  ▲
//!                                 └──┘ one window per step
//! ```
//!
//! - `SessionPending` asks the session provider for a session exactly once.
//!   A failed establishment degrades to an empty session unless the endpoint
//!   strictly requires one, in which case every symbol fails with
//!   `SessionError` and no fetch is issued.
//! - `Windowing` splits the symbols into ordered windows of at most
//!   `window_size`. The deadline is checked once per window boundary; past
//!   it, every unattempted symbol resolves to `ProcessingTimeout`. A started
//!   window always runs to completion before the next one begins, and the
//!   inter-window delay is skipped after the last window.
//!
//! At most `window_size` fetches are in flight at any instant. Fetches are
//! polled on the calling task; nothing is spawned.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use uuid::Uuid;

use crate::application::ports::{QuoteFetcher, SessionError, SessionProvider};
use crate::domain::InputError;
use crate::domain::batch::{self, BatchRequestMeta, BatchResult};
use crate::domain::endpoint::EndpointKind;
use crate::domain::fetch::{ErrorKind, FetchOutcome, FetchRequest};
use crate::domain::normalize_symbols;
use crate::domain::session::SessionContext;
use crate::infrastructure::metrics;

/// Tuning knobs for batch orchestration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Maximum number of concurrent fetches per window.
    pub window_size: usize,
    /// Pause between consecutive windows.
    pub window_delay: Duration,
    /// Global processing deadline, measured from batch start.
    pub deadline: Duration,
    /// Label naming the upstream data source in results.
    pub source_label: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            window_size: 5,
            window_delay: Duration::from_millis(500),
            deadline: Duration::from_secs(25),
            source_label: "nse".to_string(),
        }
    }
}

/// Batch lifecycle state.
#[derive(Debug)]
enum BatchState {
    Idle,
    SessionPending,
    Windowing {
        session: SessionContext,
        next_window: usize,
    },
    Done,
}

/// Schedules windowed fetches for one batch at a time.
pub struct BatchOrchestrator {
    sessions: Arc<dyn SessionProvider>,
    fetcher: Arc<dyn QuoteFetcher>,
    settings: OrchestratorSettings,
}

impl BatchOrchestrator {
    /// Create a new orchestrator.
    ///
    /// A `window_size` of zero is treated as one.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        fetcher: Arc<dyn QuoteFetcher>,
        mut settings: OrchestratorSettings,
    ) -> Self {
        settings.window_size = settings.window_size.max(1);
        Self {
            sessions,
            fetcher,
            settings,
        }
    }

    /// Orchestrator settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run one batch for `symbols` against `endpoint`.
    ///
    /// Symbols are trimmed and deduplicated first. Every remaining symbol
    /// receives exactly one outcome in the returned result.
    ///
    /// # Errors
    ///
    /// Returns `InputError::EmptySymbols` if no usable symbol remains; no
    /// network activity happens in that case.
    #[tracing::instrument(skip_all, fields(batch_id, endpoint = %endpoint))]
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        symbols: &[S],
        endpoint: EndpointKind,
    ) -> Result<BatchResult, InputError> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(InputError::EmptySymbols);
        }

        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));

        let started = Instant::now();
        let windows: Vec<&[String]> = symbols.chunks(self.settings.window_size).collect();
        let mut outcomes: Vec<FetchOutcome> = Vec::with_capacity(symbols.len());
        let mut session_established = false;
        let mut state = BatchState::Idle;

        tracing::info!(
            symbols = symbols.len(),
            windows = windows.len(),
            window_size = self.settings.window_size,
            "Batch started"
        );

        loop {
            state = match state {
                BatchState::Idle => BatchState::SessionPending,

                BatchState::SessionPending => match self.acquire_session(started).await {
                    Ok(session) => {
                        session_established = !session.is_empty();
                        BatchState::Windowing {
                            session,
                            next_window: 0,
                        }
                    }
                    Err(err) if endpoint.requires_session() => {
                        tracing::error!(error = %err, "Session required but unavailable, failing batch");
                        let detail = err.to_string();
                        outcomes.extend(symbols.iter().map(|symbol| {
                            FetchOutcome::failure(symbol.clone(), ErrorKind::SessionError, &detail)
                        }));
                        BatchState::Done
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Continuing batch without session");
                        BatchState::Windowing {
                            session: SessionContext::empty(),
                            next_window: 0,
                        }
                    }
                },

                BatchState::Windowing {
                    session,
                    next_window,
                } => match windows.get(next_window) {
                    None => BatchState::Done,
                    Some(_) if started.elapsed() >= self.settings.deadline => {
                        let remaining = &windows[next_window..];
                        tracing::warn!(
                            window = next_window,
                            skipped = remaining.iter().map(|w| w.len()).sum::<usize>(),
                            elapsed_ms = started.elapsed().as_millis(),
                            "Processing deadline exceeded, abandoning remaining windows"
                        );
                        let detail = format!(
                            "deadline of {}ms reached before this symbol was attempted",
                            self.settings.deadline.as_millis()
                        );
                        outcomes.extend(remaining.iter().flat_map(|w| w.iter()).map(|symbol| {
                            FetchOutcome::failure(
                                symbol.clone(),
                                ErrorKind::ProcessingTimeout,
                                &detail,
                            )
                        }));
                        BatchState::Done
                    }
                    Some(window) => {
                        outcomes.extend(
                            self.run_window(next_window, window, endpoint, &session)
                                .await,
                        );

                        let next_window = next_window + 1;
                        if next_window < windows.len() && !self.settings.window_delay.is_zero() {
                            tokio::time::sleep(self.settings.window_delay).await;
                        }
                        BatchState::Windowing {
                            session,
                            next_window,
                        }
                    }
                },

                BatchState::Done => break,
            };
        }

        if outcomes
            .iter()
            .any(|o| o.error_kind().is_some_and(|k| k.is_access_denied()))
        {
            tracing::info!("Upstream denied access, invalidating reusable session");
            self.sessions.invalidate();
        }

        let elapsed = started.elapsed();
        let result = batch::compile(
            outcomes,
            BatchRequestMeta {
                batch_id,
                endpoint,
                source: self.settings.source_label.clone(),
                symbols,
                session_established,
                elapsed,
            },
        );

        metrics::record_batch(endpoint, result.status(), elapsed);
        tracing::info!(
            status = result.status().as_str(),
            succeeded = result.meta.succeeded,
            failed = result.meta.failed,
            elapsed_ms = elapsed.as_millis(),
            "Batch completed"
        );

        Ok(result)
    }

    /// Ask the provider for a session, bounded by the batch deadline.
    async fn acquire_session(&self, started: Instant) -> Result<SessionContext, SessionError> {
        let budget = self.settings.deadline.saturating_sub(started.elapsed());
        tokio::time::timeout(budget, self.sessions.establish())
            .await
            .unwrap_or(Err(SessionError::DeadlineExceeded))
    }

    /// Dispatch one window concurrently and wait for every item.
    async fn run_window(
        &self,
        index: usize,
        window: &[String],
        endpoint: EndpointKind,
        session: &SessionContext,
    ) -> Vec<FetchOutcome> {
        tracing::debug!(window = index, size = window.len(), "Dispatching window");
        metrics::record_window(endpoint);

        let requests: Vec<FetchRequest> = window
            .iter()
            .map(|symbol| FetchRequest::new(symbol.clone(), endpoint))
            .collect();

        let outcomes = join_all(
            requests
                .iter()
                .map(|request| self.fetcher.fetch_one(request, session)),
        )
        .await;

        for outcome in &outcomes {
            metrics::record_fetch_outcome(endpoint, outcome.error_kind());
        }
        outcomes
    }
}
