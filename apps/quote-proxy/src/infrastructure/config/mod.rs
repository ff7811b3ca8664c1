//! Configuration Module
//!
//! Configuration loading for the proxy service.

mod settings;

pub use settings::{
    BatchSettings, ConfigError, DEFAULT_NAVIGATION_PATHS, DEFAULT_TOKEN_NAMES,
    DEFAULT_UPSTREAM_BASE_URL, ProxyConfig, ServerSettings, SessionPolicy, SessionSettings,
    StatusPolicy,
};
