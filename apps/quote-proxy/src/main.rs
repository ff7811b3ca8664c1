//! Quote Proxy Binary
//!
//! Starts the batched quote proxy.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-proxy
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `QUOTE_PROXY_PORT`: HTTP port (default: 8080)
//! - `UPSTREAM_BASE_URL`: Exchange site (default: <https://www.nseindia.com>)
//! - `QUOTE_PROXY_WINDOW_SIZE`: Concurrent fetches per window (default: 5)
//! - `QUOTE_PROXY_DEADLINE_MS`: Batch deadline (default: 25000)
//! - `QUOTE_PROXY_SESSION_TTL_SECS`: Session reuse TTL, 0 disables (default: 0)
//! - `QUOTE_PROXY_STATUS_POLICY`: detailed | simple (default: detailed)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use quote_proxy::infrastructure::{telemetry, upstream};
use quote_proxy::{AppState, HttpServer, ProxyConfig, SessionPolicy, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting quote proxy");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
    }

    let config = ProxyConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let client = upstream::build_client().context("failed to build upstream HTTP client")?;

    let shutdown_token = CancellationToken::new();
    let state = AppState::from_config(&config, client);
    let server = HttpServer::new(config.server.port, state, shutdown_token.clone());

    tokio::spawn(await_shutdown(shutdown_token));

    server.run().await?;
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ProxyConfig) {
    let session_ttl_secs = match config.session.policy {
        SessionPolicy::PerBatch => 0,
        SessionPolicy::Reuse { ttl } => ttl.as_secs(),
    };
    tracing::info!(
        port = config.server.port,
        upstream = %config.upstream_base_url,
        source = %config.source_label,
        window_size = config.batch.window_size,
        deadline_ms = u64::try_from(config.batch.deadline.as_millis()).unwrap_or(u64::MAX),
        status_policy = config.server.status_policy.as_str(),
        session_ttl_secs,
        "Configuration loaded"
    );
    tracing::debug!(
        navigation = ?config.session.navigation_paths,
        attempts = config.session.max_attempts,
        item_timeout_ms = u64::try_from(config.batch.item_timeout.as_millis()).unwrap_or(u64::MAX),
        "Session settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
