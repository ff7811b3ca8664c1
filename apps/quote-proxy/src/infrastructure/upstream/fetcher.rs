//! Single-Item Fetcher
//!
//! Issues one data request per symbol with the shared session and folds
//! every result, including transport errors, into a [`FetchOutcome`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use super::headers::{RequestPhase, build_headers};
use crate::application::ports::QuoteFetcher;
use crate::domain::fetch::{ErrorKind, FetchOutcome, FetchRequest};
use crate::domain::session::SessionContext;

/// Fetches symbol data from the upstream JSON API.
#[derive(Debug, Clone)]
pub struct HttpQuoteFetcher {
    client: Client,
    base_url: Url,
    item_timeout: Duration,
    referer: Option<String>,
}

impl HttpQuoteFetcher {
    /// Create a fetcher for the given upstream.
    #[must_use]
    pub const fn new(client: Client, base_url: Url, item_timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            item_timeout,
            referer: None,
        }
    }

    /// Present `referer` on every data request.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Absolute URL for one request, `None` if the base URL cannot take a path.
    #[must_use]
    pub fn endpoint_url(&self, request: &FetchRequest) -> Option<Url> {
        let mut url = self.base_url.join(request.endpoint.path()).ok()?;
        let query = request.endpoint.query(&request.symbol);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Some(url)
    }

    fn describe_transport_error(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!(
                "request timed out after {}ms",
                self.item_timeout.as_millis()
            )
        } else if error.is_connect() {
            format!("connection failed: {error}")
        } else {
            error.to_string()
        }
    }
}

#[async_trait]
impl QuoteFetcher for HttpQuoteFetcher {
    async fn fetch_one(&self, request: &FetchRequest, session: &SessionContext) -> FetchOutcome {
        let symbol = request.symbol.as_str();

        let Some(url) = self.endpoint_url(request) else {
            return FetchOutcome::failure(
                symbol,
                ErrorKind::NetworkError,
                format!("cannot build upstream URL from {}", self.base_url),
            );
        };

        let cookie = session.cookie_header();
        let headers = build_headers(
            RequestPhase::DataFetch,
            self.referer.as_deref(),
            cookie.as_deref(),
        );

        let response = match self
            .client
            .get(url)
            .headers(headers)
            .timeout(self.item_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(symbol, error = %e, "Fetch transport error");
                return FetchOutcome::failure(
                    symbol,
                    ErrorKind::NetworkError,
                    self.describe_transport_error(&e),
                );
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(symbol, status = status.as_u16(), "Upstream rejected fetch");
            return FetchOutcome::failure(
                symbol,
                ErrorKind::HttpStatus(status.as_u16()),
                format!("upstream responded with HTTP {status}"),
            );
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::failure(
                    symbol,
                    ErrorKind::NetworkError,
                    self.describe_transport_error(&e),
                );
            }
        };

        match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => FetchOutcome::success(symbol, payload),
            Err(e) => FetchOutcome::failure(
                symbol,
                ErrorKind::MalformedResponse,
                format!("response body is not valid JSON: {e}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::endpoint::EndpointKind;
    use crate::domain::fetch::ACCESS_DENIED_SUGGESTION;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(base: &str, timeout: Duration) -> HttpQuoteFetcher {
        HttpQuoteFetcher::new(Client::new(), Url::parse(base).unwrap(), timeout)
    }

    fn session() -> SessionContext {
        SessionContext::new(BTreeMap::from([("nsit".to_string(), "abc".to_string())]))
    }

    #[test]
    fn urls_follow_endpoint_templates() {
        let f = fetcher("https://upstream.example", Duration::from_secs(1));

        let quote = f
            .endpoint_url(&FetchRequest::new("M&M", EndpointKind::Quote))
            .unwrap();
        assert_eq!(
            quote.as_str(),
            "https://upstream.example/api/quote-equity?symbol=M%26M"
        );

        let chart = f
            .endpoint_url(&FetchRequest::new("TCS", EndpointKind::Chart))
            .unwrap();
        assert_eq!(
            chart.as_str(),
            "https://upstream.example/api/chart-databyindex?index=TCSEQN"
        );

        let status = f
            .endpoint_url(&FetchRequest::new("ANY", EndpointKind::MarketStatus))
            .unwrap();
        assert_eq!(status.as_str(), "https://upstream.example/api/marketStatus");
    }

    #[tokio::test]
    async fn json_body_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/quote-equity"))
            .and(query_param("symbol", "RELIANCE"))
            .and(header("cookie", "nsit=abc"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastPrice": 2950.5})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_secs(2))
            .fetch_one(&FetchRequest::new("RELIANCE", EndpointKind::Quote), &session())
            .await;

        assert_eq!(
            outcome,
            FetchOutcome::success("RELIANCE", json!({"lastPrice": 2950.5}))
        );
    }

    #[tokio::test]
    async fn unauthorized_carries_suggestion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_secs(2))
            .fetch_one(&FetchRequest::new("TCS", EndpointKind::Quote), &session())
            .await;

        match outcome {
            FetchOutcome::Failure {
                kind, suggestion, ..
            } => {
                assert_eq!(kind, ErrorKind::HttpStatus(401));
                assert_eq!(suggestion.as_deref(), Some(ACCESS_DENIED_SUGGESTION));
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn server_error_is_http_status_without_suggestion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_secs(2))
            .fetch_one(&FetchRequest::new("INFY", EndpointKind::Quote), &session())
            .await;

        match outcome {
            FetchOutcome::Failure {
                kind, suggestion, ..
            } => {
                assert_eq!(kind, ErrorKind::HttpStatus(503));
                assert!(suggestion.is_none());
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn html_body_is_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_secs(2))
            .fetch_one(&FetchRequest::new("INFY", EndpointKind::Quote), &session())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::MalformedResponse));
    }

    #[tokio::test]
    async fn slow_upstream_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_millis(50))
            .fetch_one(&FetchRequest::new("SBIN", EndpointKind::Quote), &session())
            .await;

        match outcome {
            FetchOutcome::Failure { kind, detail, .. } => {
                assert_eq!(kind, ErrorKind::NetworkError);
                assert_eq!(detail, "request timed out after 50ms");
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_is_network_error() {
        let outcome = fetcher("http://127.0.0.1:1", Duration::from_secs(1))
            .fetch_one(&FetchRequest::new("SBIN", EndpointKind::Quote), &session())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NetworkError));
    }

    #[tokio::test]
    async fn empty_session_sends_no_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let outcome = fetcher(&server.uri(), Duration::from_secs(2))
            .with_referer("https://upstream.example/get-quotes/equity")
            .fetch_one(
                &FetchRequest::new("NIFTY 50", EndpointKind::Indices),
                &SessionContext::empty(),
            )
            .await;

        assert!(outcome.is_success());
        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("cookie"));
        assert_eq!(
            requests[0].headers["referer"],
            "https://upstream.example/get-quotes/equity"
        );
        assert_eq!(requests[0].url.query(), Some("index=NIFTY+50"));
    }
}
