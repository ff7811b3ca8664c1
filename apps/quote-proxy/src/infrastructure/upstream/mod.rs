//! Upstream Exchange Adapters
//!
//! HTTP implementations of the session and fetch ports:
//!
//! - `session`: browser-like navigation that collects session credentials
//! - `fetcher`: per-symbol JSON data requests
//! - `cache`: optional session reuse across batches
//! - `cookies`, `headers`, `retry`: pure helpers shared by the above

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;

pub mod cache;
pub mod cookies;
pub mod fetcher;
pub mod headers;
pub mod retry;
pub mod session;

pub use cache::CachedSessionProvider;
pub use fetcher::HttpQuoteFetcher;
pub use session::HttpSessionEstablisher;

/// Connect timeout for upstream requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the client shared by the upstream adapters.
///
/// Redirects are not followed automatically: the session establisher walks
/// them itself so cookies set on a 3xx reach the jar.
///
/// # Errors
///
/// Returns the reqwest error if the TLS backend cannot be initialized.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
}
