//! Inbound HTTP API
//!
//! # Endpoints
//!
//! - `GET|POST /api/quotes` - Run one batch and return the compiled result
//! - `OPTIONS /api/quotes` - CORS preflight (204)
//! - `GET /health`, `GET /healthz`, `GET /metrics` - see [`health`]
//!
//! Every response is JSON except the liveness and metrics bodies, and every
//! response carries permissive CORS headers.

pub mod health;
pub mod quotes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Uri, header};
use axum::response::Response;
use axum::routing::get;
use axum::{Router, middleware};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::SessionProvider;
use crate::application::services::BatchOrchestrator;
use crate::infrastructure::config::{ProxyConfig, ServerSettings, SessionPolicy};
use crate::infrastructure::upstream::{
    CachedSessionProvider, HttpQuoteFetcher, HttpSessionEstablisher,
};

pub use health::{BatchCounts, HealthResponse, HealthState};
pub use quotes::{ApiError, QuoteBody, QuoteQuery, status_for};

// =============================================================================
// Application State
// =============================================================================

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<BatchOrchestrator>,
    server: ServerSettings,
    health: Arc<HealthState>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(orchestrator: Arc<BatchOrchestrator>, server: ServerSettings) -> Self {
        Self {
            orchestrator,
            server,
            health: Arc::new(HealthState::new(env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Wire the HTTP upstream adapters and orchestrator from configuration.
    ///
    /// Data requests present the last navigation page as their referer.
    #[must_use]
    pub fn from_config(config: &ProxyConfig, client: reqwest::Client) -> Self {
        let establisher: Arc<dyn SessionProvider> = Arc::new(HttpSessionEstablisher::new(
            client.clone(),
            config.upstream_base_url.clone(),
            &config.session,
        ));
        let sessions: Arc<dyn SessionProvider> = match config.session.policy {
            SessionPolicy::PerBatch => establisher,
            SessionPolicy::Reuse { ttl } => Arc::new(CachedSessionProvider::new(establisher, ttl)),
        };

        let mut fetcher = HttpQuoteFetcher::new(
            client,
            config.upstream_base_url.clone(),
            config.batch.item_timeout,
        );
        if let Some(referer) = config
            .session
            .navigation_paths
            .last()
            .and_then(|path| config.upstream_base_url.join(path).ok())
        {
            fetcher = fetcher.with_referer(referer.as_str());
        }

        let orchestrator =
            BatchOrchestrator::new(sessions, Arc::new(fetcher), config.orchestrator_settings());
        Self::new(Arc::new(orchestrator), config.server.clone())
    }

    /// Health counters.
    #[must_use]
    pub fn health(&self) -> &HealthState {
        &self.health
    }
}

/// Create the Axum router with all endpoints.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/quotes",
            get(quotes::get_quotes)
                .post(quotes::post_quotes)
                .options(quotes::preflight)
                .fallback(quotes::method_not_allowed),
        )
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/metrics", get(health::metrics_handler))
        .fallback(not_found)
        .layer(middleware::map_response(add_cors_headers))
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Quote proxy HTTP server.
pub struct HttpServer {
    port: u16,
    state: AppState,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: AppState, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = create_router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Quote proxy listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Quote proxy stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{QuoteFetcher, SessionError, SessionProvider};
    use crate::application::services::OrchestratorSettings;
    use crate::domain::fetch::{ErrorKind, FetchOutcome, FetchRequest};
    use crate::domain::session::SessionContext;

    struct StaticSession {
        fail: bool,
    }

    #[async_trait]
    impl SessionProvider for StaticSession {
        async fn establish(&self) -> Result<SessionContext, SessionError> {
            if self.fail {
                return Err(SessionError::NoCredentials);
            }
            Ok(SessionContext::new(
                [("nsit".to_string(), "abc".to_string())].into(),
            ))
        }
    }

    /// Answers per symbol: a status code, or a network error when absent.
    struct StubFetcher {
        statuses: HashMap<&'static str, u16>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteFetcher for StubFetcher {
        async fn fetch_one(
            &self,
            request: &FetchRequest,
            _session: &SessionContext,
        ) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.statuses.get(request.symbol.as_str()) {
                Some(200) => FetchOutcome::success(&request.symbol, json!({"symbol": request.symbol})),
                Some(code) => FetchOutcome::failure(
                    &request.symbol,
                    ErrorKind::HttpStatus(*code),
                    format!("upstream responded with HTTP {code}"),
                ),
                None => FetchOutcome::failure(
                    &request.symbol,
                    ErrorKind::NetworkError,
                    "request timed out after 8000ms",
                ),
            }
        }
    }

    fn app(statuses: &[(&'static str, u16)], session_fails: bool) -> (Router, Arc<StubFetcher>) {
        let fetcher = Arc::new(StubFetcher {
            statuses: statuses.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        });
        let orchestrator = BatchOrchestrator::new(
            Arc::new(StaticSession {
                fail: session_fails,
            }),
            fetcher.clone(),
            OrchestratorSettings {
                window_delay: Duration::ZERO,
                ..OrchestratorSettings::default()
            },
        );
        let state = AppState::new(Arc::new(orchestrator), ServerSettings::default());
        (create_router(state), fetcher)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn partial_success_is_multi_status() {
        let (router, fetcher) = app(&[("RELIANCE", 200), ("TCS", 401)], false);

        let (status, headers, body) = send(router, get("/api/quotes?symbols=RELIANCE,TCS")).await;

        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(body["data"]["RELIANCE"]["symbol"], "RELIANCE");
        assert_eq!(body["errors"]["TCS"]["status"], 401);
        assert!(
            body["errors"]["TCS"]["error"]
                .as_str()
                .unwrap()
                .contains("Access denied")
        );
        assert!(body["errors"]["TCS"]["suggestion"].is_string());
        assert_eq!(body["meta"]["status"], "partial_success");
        assert_eq!(body["meta"]["requested"], 2);
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, max-age=30, s-maxage=30"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn empty_symbols_is_bad_request_without_upstream_calls() {
        let (router, fetcher) = app(&[], false);

        let (status, headers, body) = send(router, get("/api/quotes?symbols=")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(body["kind"], "INPUT_ERROR");
        assert!(body["usage"]["get"].is_string());
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn unknown_endpoint_lists_valid_kinds() {
        let (router, fetcher) = app(&[("RELIANCE", 200)], false);

        let (status, _, body) =
            send(router, get("/api/quotes?symbol=RELIANCE&endpoint=futures")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("futures"));
        assert!(message.contains("optionChain"));
    }

    #[tokio::test]
    async fn all_network_failures_is_total_failure() {
        let (router, _) = app(&[], false);

        let (status, _, body) = send(router, get("/api/quotes?symbols=A,B,C")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["meta"]["status"], "total_failure");
        assert_eq!(body["data"].as_object().unwrap().len(), 0);
        let errors = body["errors"].as_object().unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors.values().all(|e| e["kind"] == "NETWORK_ERROR"));
    }

    #[tokio::test]
    async fn session_required_endpoint_without_session_is_unavailable() {
        let (router, fetcher) = app(&[("NIFTY", 200)], true);

        let (status, _, body) =
            send(router, get("/api/quotes?symbol=NIFTY&endpoint=optionChain")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(body["errors"]["NIFTY"]["kind"], "SESSION_ERROR");
        assert_eq!(body["meta"]["sessionEstablished"], false);
    }

    #[tokio::test]
    async fn post_body_runs_batch() {
        let (router, _) = app(&[("INFY", 200), ("TCS", 200)], false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/quotes")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"symbols": ["INFY", "TCS", "INFY"], "endpoint": "trade-info"}).to_string(),
            ))
            .unwrap();

        let (status, _, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["endpoint"], "tradeInfo");
        assert_eq!(body["meta"]["requested"], 2);
    }

    #[tokio::test]
    async fn malformed_post_body_is_bad_request() {
        let (router, _) = app(&[], false);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/quotes")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, _, body) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INPUT_ERROR");
    }

    #[tokio::test]
    async fn preflight_is_no_content_with_cors() {
        let (router, _) = app(&[], false);
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/quotes")
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(router, request).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn other_methods_are_rejected_as_json() {
        let (router, _) = app(&[], false);
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/quotes")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(router, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["kind"], "METHOD_NOT_ALLOWED");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn unknown_path_is_json_not_found() {
        let (router, _) = app(&[], false);

        let (status, _, body) = send(router, get("/api/nothing")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn health_reports_batch_counters() {
        let (router, _) = app(&[("RELIANCE", 200)], false);

        let (status, _, _) = send(router.clone(), get("/api/quotes?symbol=RELIANCE")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["source"], "nse");
        assert_eq!(body["batches"]["complete_success"], 1);
    }

    #[tokio::test]
    async fn liveness_probe() {
        let (router, _) = app(&[], false);
        let response = router.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
