#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Quote Proxy - Batched Exchange Quote Fetcher
//!
//! An HTTP proxy that fetches per-symbol quote data from an exchange site
//! that only answers browser-like clients. Each batch acquires a session
//! by walking the site's landing pages, then fans symbol fetches out in
//! bounded windows under a global deadline and compiles every outcome into
//! one keyed JSON result.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and reductions
//!   - `endpoint`: Endpoint kinds and upstream path templates
//!   - `fetch`: Fetch requests, outcomes and error kinds
//!   - `session`: Session credential bundle
//!   - `batch`: Result compilation and status selection
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Session provider and quote fetcher interfaces
//!   - `services`: Windowed batch orchestrator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: HTTP session establisher, fetcher and session cache
//!   - `http`: Inbound API, health and metrics endpoints
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! caller ──► /api/quotes ──► BatchOrchestrator ──► SessionProvider ──► upstream pages
//!                                   │
//!                                   └─ windows of W ──► QuoteFetcher ──► upstream API
//!                                   │
//!            JSON result ◄── compile ◄┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Batch types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::InputError;
pub use domain::batch::{BatchMeta, BatchResult, BatchStatus, SymbolError, compile};
pub use domain::endpoint::EndpointKind;
pub use domain::fetch::{ErrorKind, FetchOutcome, FetchRequest};
pub use domain::session::SessionContext;

// Application
pub use application::ports::{QuoteFetcher, SessionError, SessionProvider};
pub use application::services::{BatchOrchestrator, OrchestratorSettings};

// Infrastructure config
pub use infrastructure::config::{
    BatchSettings, ConfigError, ProxyConfig, ServerSettings, SessionPolicy, SessionSettings,
    StatusPolicy,
};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, ServerError, create_router};

// Upstream adapters
pub use infrastructure::upstream::{
    CachedSessionProvider, HttpQuoteFetcher, HttpSessionEstablisher,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
