//! Session Establisher
//!
//! Walks the upstream's landing pages like a browser would, collecting the
//! cookies and embedded tokens later data requests must present. Each walk
//! is one attempt, bounded by the sequence timeout and retried with a fixed
//! backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::{Client, Response, Url};

use super::cookies::CredentialJar;
use super::headers::{RequestPhase, build_headers};
use super::retry::{RetryConfig, RetryPolicy};
use crate::application::ports::{SessionError, SessionProvider};
use crate::domain::session::SessionContext;
use crate::infrastructure::config::SessionSettings;
use crate::infrastructure::metrics::{self, SessionAttemptResult};

/// Redirects followed within a single navigation step.
const MAX_REDIRECT_HOPS: usize = 5;

/// Establishes upstream sessions over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionEstablisher {
    client: Client,
    base_url: Url,
    navigation_paths: Vec<String>,
    token_names: Vec<String>,
    retry: RetryConfig,
    sequence_timeout: Duration,
}

impl HttpSessionEstablisher {
    /// Create an establisher for the given upstream.
    ///
    /// `client` should not follow redirects itself (see
    /// [`build_client`](super::build_client)); otherwise cookies set on
    /// intermediate 3xx responses are lost.
    #[must_use]
    pub fn new(client: Client, base_url: Url, settings: &SessionSettings) -> Self {
        Self {
            client,
            base_url,
            navigation_paths: settings.navigation_paths.clone(),
            token_names: settings.token_names.clone(),
            retry: RetryConfig::new(settings.max_attempts, settings.backoff),
            sequence_timeout: settings.sequence_timeout,
        }
    }

    /// One pass over the navigation sequence.
    ///
    /// Redirects are followed by hand, up to `MAX_REDIRECT_HOPS` per step,
    /// so every hop's `Set-Cookie` headers land in the jar and the next hop
    /// carries them.
    async fn run_sequence(&self) -> Result<SessionContext, SessionError> {
        let mut jar = CredentialJar::new();
        let mut referer: Option<String> = None;

        for path in &self.navigation_paths {
            let mut url = self
                .base_url
                .join(path)
                .map_err(|e| SessionError::Network {
                    url: path.clone(),
                    message: e.to_string(),
                })?;
            let mut hops = 0;

            let response = loop {
                let headers = build_headers(
                    RequestPhase::Navigation,
                    referer.as_deref(),
                    jar.cookie_header().as_deref(),
                );
                let response = self
                    .client
                    .get(url.clone())
                    .headers(headers)
                    .send()
                    .await
                    .map_err(|e| SessionError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;

                jar.absorb_set_cookies(
                    response
                        .headers()
                        .get_all(SET_COOKIE)
                        .iter()
                        .filter_map(|v| v.to_str().ok()),
                );

                let Some(next) = redirect_target(&response, &url) else {
                    break response;
                };
                if hops == MAX_REDIRECT_HOPS {
                    return Err(SessionError::NavigationStatus {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                hops += 1;
                tracing::debug!(from = %url, to = %next, "Following navigation redirect");
                referer = Some(url.to_string());
                url = next;
            };

            let status = response.status();
            if !status.is_success() {
                return Err(SessionError::NavigationStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.text().await.map_err(|e| SessionError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            jar.absorb_body_tokens(&body, &self.token_names);

            tracing::debug!(url = %url, status = status.as_u16(), "Navigation step complete");
            referer = Some(url.to_string());
        }

        if jar.is_empty() {
            return Err(SessionError::NoCredentials);
        }
        Ok(jar.into_session())
    }
}

/// Resolve the `Location` of a 3xx response against the URL that produced it.
fn redirect_target(response: &Response, current: &Url) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

#[async_trait]
impl SessionProvider for HttpSessionEstablisher {
    async fn establish(&self) -> Result<SessionContext, SessionError> {
        let mut policy = RetryPolicy::new(self.retry);
        let mut last = SessionError::NoCredentials;

        while let Some(attempt) = policy.begin_attempt() {
            let result = tokio::time::timeout(self.sequence_timeout, self.run_sequence())
                .await
                .unwrap_or(Err(SessionError::SequenceTimeout(self.sequence_timeout)));

            match result {
                Ok(session) => {
                    metrics::record_session_attempt(SessionAttemptResult::Established);
                    tracing::info!(
                        attempt,
                        credentials = session.len(),
                        "Upstream session established"
                    );
                    return Ok(session);
                }
                Err(e) => {
                    metrics::record_session_attempt(SessionAttemptResult::Failed);
                    tracing::warn!(attempt, error = %e, "Session attempt failed");
                    last = e;
                }
            }

            if let Some(delay) = policy.backoff_after_failure() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(SessionError::Exhausted {
            attempts: policy.attempt_count(),
            last: Box::new(last),
        })
    }
}
