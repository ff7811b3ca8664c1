//! Batch Quote Endpoint
//!
//! `GET /api/quotes?symbols=A,B&endpoint=quote` and
//! `POST /api/quotes {"symbols": [...], "endpoint": "..."}` both run one
//! batch and answer with the compiled result.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use crate::domain::batch::{BatchResult, BatchStatus};
use crate::domain::endpoint::EndpointKind;
use crate::domain::{InputError, parse_symbol_list};
use crate::infrastructure::config::StatusPolicy;

/// Query parameters for `GET /api/quotes`.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    /// A single symbol.
    pub symbol: Option<String>,
    /// Comma-separated symbols.
    pub symbols: Option<String>,
    /// Endpoint kind, defaults to `quote`.
    pub endpoint: Option<String>,
}

impl QuoteQuery {
    fn symbol_list(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbol.iter().cloned().collect();
        if let Some(list) = &self.symbols {
            symbols.extend(parse_symbol_list(list));
        }
        symbols
    }
}

/// JSON body for `POST /api/quotes`.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteBody {
    /// Requested symbols.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Endpoint kind, defaults to `quote`.
    pub endpoint: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

pub(super) async fn get_quotes(
    State(state): State<AppState>,
    query: Result<Query<QuoteQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| InputError::InvalidBody(e.body_text()))?;
    run_batch(&state, &query.symbol_list(), query.endpoint.as_deref()).await
}

pub(super) async fn post_quotes(
    State(state): State<AppState>,
    body: Result<Json<QuoteBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| InputError::InvalidBody(e.body_text()))?;
    run_batch(&state, &body.symbols, body.endpoint.as_deref()).await
}

pub(super) async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(super) async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

async fn run_batch(
    state: &AppState,
    symbols: &[String],
    endpoint: Option<&str>,
) -> Result<Response, ApiError> {
    let endpoint = endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::parse::<EndpointKind>)
        .transpose()?
        .unwrap_or_default();

    let result = state.orchestrator.run_batch(symbols, endpoint).await?;
    state.health.record_batch(result.status());

    let status = status_for(&result, state.server.status_policy);
    let cache_control = format!(
        "public, max-age={age}, s-maxage={age}",
        age = state.server.cache_max_age_secs
    );
    let mut response = (status, Json(result)).into_response();
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    Ok(response)
}

/// HTTP status for a compiled batch.
#[must_use]
pub fn status_for(result: &BatchResult, policy: StatusPolicy) -> StatusCode {
    match (result.status(), policy) {
        (BatchStatus::CompleteSuccess, _) | (BatchStatus::PartialSuccess, StatusPolicy::Simple) => {
            StatusCode::OK
        }
        (BatchStatus::PartialSuccess, StatusPolicy::Detailed) => StatusCode::MULTI_STATUS,
        (BatchStatus::TotalFailure, _) if !result.meta.session_established => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        (BatchStatus::TotalFailure, _) => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Request-level failures, always rendered as JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad caller input.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Unsupported HTTP method on a known route.
    #[error("method {0} is not allowed, use GET, POST or OPTIONS")]
    MethodNotAllowed(Method),

    /// No route matched.
    #[error("no route for {0}")]
    NotFound(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "INPUT_ERROR",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }
}

/// Usage hint attached to every error body.
fn usage() -> Value {
    json!({
        "get": "/api/quotes?symbols=RELIANCE,TCS&endpoint=quote",
        "post": {
            "path": "/api/quotes",
            "body": { "symbols": ["RELIANCE", "TCS"], "endpoint": "quote" }
        },
        "endpoints": EndpointKind::valid_names(),
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::debug!(error = %self, status = status.as_u16(), "Rejected request");
        }
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "usage": usage(),
        });
        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );
        if matches!(self, Self::MethodNotAllowed(_)) {
            response.headers_mut().insert(
                header::ALLOW,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
        }
        response
    }
}
