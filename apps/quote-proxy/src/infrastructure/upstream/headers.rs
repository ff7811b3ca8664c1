//! Browser Header Templates
//!
//! The upstream only serves requests that look browser-originated. Header
//! sets are declared once per request phase and filled in with the
//! referer and cookie at call time.

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER};

/// Browser identity presented on every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Which kind of request a header set is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Page loads during session establishment.
    Navigation,
    /// JSON data requests for a single symbol.
    DataFetch,
}

impl RequestPhase {
    const fn template(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Navigation => NAVIGATION_TEMPLATE,
            Self::DataFetch => DATA_FETCH_TEMPLATE,
        }
    }
}

const NAVIGATION_TEMPLATE: &[(&str, &str)] = &[
    ("user-agent", BROWSER_USER_AGENT),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
];

const DATA_FETCH_TEMPLATE: &[(&str, &str)] = &[
    ("user-agent", BROWSER_USER_AGENT),
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("x-requested-with", "XMLHttpRequest"),
];

/// Build the header map for one request.
///
/// Values that are not valid header text are skipped rather than failing
/// the request.
#[must_use]
pub fn build_headers(phase: RequestPhase, referer: Option<&str>, cookie: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(phase.template().len() + 2);
    for &(name, value) in phase.template() {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if let Some(referer) = referer
        && let Ok(value) = HeaderValue::from_str(referer)
    {
        headers.insert(REFERER, value);
    }
    if let Some(cookie) = cookie
        && let Ok(value) = HeaderValue::from_str(cookie)
    {
        headers.insert(COOKIE, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, USER_AGENT};

    #[test]
    fn navigation_headers_accept_html_without_xhr_marker() {
        let headers = build_headers(RequestPhase::Navigation, None, None);
        assert!(headers[ACCEPT].to_str().unwrap().starts_with("text/html"));
        assert!(!headers.contains_key("x-requested-with"));
        assert!(!headers.contains_key(REFERER));
        assert!(!headers.contains_key(COOKIE));
    }

    #[test]
    fn data_headers_carry_referer_and_cookie() {
        let headers = build_headers(
            RequestPhase::DataFetch,
            Some("https://upstream/get-quotes/equity"),
            Some("nsit=abc; bm_sv=xyz"),
        );
        assert_eq!(headers[ACCEPT], "application/json, text/plain, */*");
        assert_eq!(headers["x-requested-with"], "XMLHttpRequest");
        assert_eq!(headers[REFERER], "https://upstream/get-quotes/equity");
        assert_eq!(headers[COOKIE], "nsit=abc; bm_sv=xyz");
        assert_eq!(headers[USER_AGENT], BROWSER_USER_AGENT);
    }

    #[test]
    fn invalid_cookie_text_is_dropped() {
        let headers = build_headers(RequestPhase::DataFetch, None, Some("bad\nvalue"));
        assert!(!headers.contains_key(COOKIE));
    }
}
