//! Proxy Configuration Settings
//!
//! Configuration types for the quote proxy, loaded from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::application::services::OrchestratorSettings;

/// Default upstream exchange site.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://www.nseindia.com";

/// Default navigation sequence walked to acquire session cookies.
pub const DEFAULT_NAVIGATION_PATHS: [&str; 3] =
    ["/", "/market-data/live-equity-market", "/get-quotes/equity"];

/// Default token names scanned for in navigation page bodies.
pub const DEFAULT_TOKEN_NAMES: [&str; 4] = ["nseappid", "csrfToken", "bm_sv", "ak_bmsc"];

/// How HTTP status codes are derived from batch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// 200 all success, 207 partial, 502/503 total failure.
    #[default]
    Detailed,
    /// 200 for any success, 502/503 total failure.
    Simple,
}

impl StatusPolicy {
    /// Parse policy from string, falling back to `Detailed`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Parse policy from string, `None` for unknown names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "detailed" => Some(Self::Detailed),
            "simple" => Some(Self::Simple),
            _ => None,
        }
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Detailed => "detailed",
            Self::Simple => "simple",
        }
    }
}

/// Whether a session is re-established per batch or reused across batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Establish a fresh session for every batch.
    #[default]
    PerBatch,
    /// Reuse the last session until it is older than `ttl` or rejected.
    Reuse {
        /// Maximum age of a reused session.
        ttl: Duration,
    },
}

/// Upstream session establishment settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Navigation paths walked in order, relative to the base URL.
    pub navigation_paths: Vec<String>,
    /// Token names extracted from page bodies.
    pub token_names: Vec<String>,
    /// Maximum number of attempts for the whole sequence.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
    /// Timeout for one full navigation sequence.
    pub sequence_timeout: Duration,
    /// Reuse policy.
    pub policy: SessionPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            navigation_paths: DEFAULT_NAVIGATION_PATHS.map(String::from).to_vec(),
            token_names: DEFAULT_TOKEN_NAMES.map(String::from).to_vec(),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            sequence_timeout: Duration::from_secs(15),
            policy: SessionPolicy::PerBatch,
        }
    }
}

/// Batch scheduling settings.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Maximum concurrent fetches per window.
    pub window_size: usize,
    /// Pause between windows.
    pub window_delay: Duration,
    /// Global processing deadline per batch.
    pub deadline: Duration,
    /// Timeout for a single symbol fetch.
    pub item_timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            window_size: 5,
            window_delay: Duration::from_millis(500),
            deadline: Duration::from_secs(25),
            item_timeout: Duration::from_secs(8),
        }
    }
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP listen port.
    pub port: u16,
    /// `max-age` / `s-maxage` for batch responses, in seconds.
    pub cache_max_age_secs: u32,
    /// HTTP status selection policy.
    pub status_policy: StatusPolicy,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_max_age_secs: 30,
            status_policy: StatusPolicy::Detailed,
        }
    }
}

/// Complete proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream site base URL.
    pub upstream_base_url: Url,
    /// Label naming the upstream source in results.
    pub source_label: String,
    /// Session establishment settings.
    pub session: SessionSettings,
    /// Batch scheduling settings.
    pub batch: BatchSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
}

impl Default for ProxyConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            upstream_base_url: Url::parse(DEFAULT_UPSTREAM_BASE_URL)
                .expect("default upstream URL is valid"),
            source_label: "nse".to_string(),
            session: SessionSettings::default(),
            batch: BatchSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or settings are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or settings are inconsistent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let upstream_base_url = match lookup("UPSTREAM_BASE_URL") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("UPSTREAM_BASE_URL".to_string()));
            }
            Some(raw) => Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                key: "UPSTREAM_BASE_URL".to_string(),
                reason: e.to_string(),
            })?,
            None => defaults.upstream_base_url,
        };

        let source_label = lookup("QUOTE_PROXY_SOURCE_LABEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.source_label);

        let session_ttl = parse_u64(&lookup, "QUOTE_PROXY_SESSION_TTL_SECS", 0);
        let session = SessionSettings {
            navigation_paths: lookup("QUOTE_PROXY_NAVIGATION_PATHS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.session.navigation_paths),
            token_names: lookup("QUOTE_PROXY_TOKEN_NAMES")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.session.token_names),
            max_attempts: parse_u32(
                &lookup,
                "QUOTE_PROXY_SESSION_ATTEMPTS",
                defaults.session.max_attempts,
            ),
            backoff: parse_millis(
                &lookup,
                "QUOTE_PROXY_SESSION_BACKOFF_MS",
                defaults.session.backoff,
            ),
            sequence_timeout: parse_millis(
                &lookup,
                "QUOTE_PROXY_SESSION_TIMEOUT_MS",
                defaults.session.sequence_timeout,
            ),
            policy: if session_ttl == 0 {
                SessionPolicy::PerBatch
            } else {
                SessionPolicy::Reuse {
                    ttl: Duration::from_secs(session_ttl),
                }
            },
        };

        let batch = BatchSettings {
            window_size: parse_usize(
                &lookup,
                "QUOTE_PROXY_WINDOW_SIZE",
                defaults.batch.window_size,
            ),
            window_delay: parse_millis(
                &lookup,
                "QUOTE_PROXY_WINDOW_DELAY_MS",
                defaults.batch.window_delay,
            ),
            deadline: parse_millis(&lookup, "QUOTE_PROXY_DEADLINE_MS", defaults.batch.deadline),
            item_timeout: parse_millis(
                &lookup,
                "QUOTE_PROXY_ITEM_TIMEOUT_MS",
                defaults.batch.item_timeout,
            ),
        };

        let server = ServerSettings {
            port: parse_u16(&lookup, "QUOTE_PROXY_PORT", defaults.server.port),
            cache_max_age_secs: parse_u32(
                &lookup,
                "QUOTE_PROXY_CACHE_MAX_AGE_SECS",
                defaults.server.cache_max_age_secs,
            ),
            status_policy: lookup("QUOTE_PROXY_STATUS_POLICY")
                .map(|raw| {
                    StatusPolicy::parse(&raw).unwrap_or_else(|| {
                        tracing::warn!(
                            key = "QUOTE_PROXY_STATUS_POLICY",
                            value = %raw,
                            "Unknown status policy, using default"
                        );
                        StatusPolicy::default()
                    })
                })
                .unwrap_or_default(),
        };

        let config = Self {
            upstream_base_url,
            source_label,
            session,
            batch,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.window_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_PROXY_WINDOW_SIZE".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.session.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_PROXY_SESSION_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.session.navigation_paths.is_empty() {
            return Err(ConfigError::EmptyValue(
                "QUOTE_PROXY_NAVIGATION_PATHS".to_string(),
            ));
        }
        if self.batch.item_timeout >= self.session.sequence_timeout {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_PROXY_ITEM_TIMEOUT_MS".to_string(),
                reason: format!(
                    "must be shorter than the session sequence timeout ({}ms)",
                    self.session.sequence_timeout.as_millis()
                ),
            });
        }
        Ok(())
    }

    /// Orchestrator settings derived from this configuration.
    #[must_use]
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            window_size: self.batch.window_size,
            window_delay: self.batch.window_delay,
            deadline: self.batch.deadline,
            source_label: self.source_label.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse one raw setting, naming the key on failure.
fn parse_setting<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{raw:?}: {e}"),
    })
}

/// Read a setting, warning and falling back to `default` when it is malformed.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    parse_setting(key, &raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Ignoring malformed setting, using default");
        default
    })
}

fn parse_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    parse_or(lookup, key, default)
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    parse_or(lookup, key, default)
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    parse_or(lookup, key, default)
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    parse_or(lookup, key, default)
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    Duration::from_millis(parse_or(
        lookup,
        key,
        u64::try_from(default.as_millis()).unwrap_or(u64::MAX),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ProxyConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ProxyConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.upstream_base_url.as_str(), "https://www.nseindia.com/");
        assert_eq!(config.source_label, "nse");
        assert_eq!(config.batch.window_size, 5);
        assert_eq!(config.batch.window_delay, Duration::from_millis(500));
        assert_eq!(config.batch.deadline, Duration::from_secs(25));
        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(config.session.policy, SessionPolicy::PerBatch);
        assert_eq!(config.session.navigation_paths.len(), 3);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.status_policy, StatusPolicy::Detailed);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("UPSTREAM_BASE_URL", "http://127.0.0.1:9000"),
            ("QUOTE_PROXY_WINDOW_SIZE", "3"),
            ("QUOTE_PROXY_DEADLINE_MS", "9000"),
            ("QUOTE_PROXY_SESSION_TTL_SECS", "120"),
            ("QUOTE_PROXY_NAVIGATION_PATHS", "/, /option-chain ,"),
            ("QUOTE_PROXY_STATUS_POLICY", "SIMPLE"),
        ])
        .unwrap();

        assert_eq!(config.upstream_base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.batch.window_size, 3);
        assert_eq!(config.batch.deadline, Duration::from_millis(9000));
        assert_eq!(
            config.session.policy,
            SessionPolicy::Reuse {
                ttl: Duration::from_secs(120)
            }
        );
        assert_eq!(config.session.navigation_paths, vec!["/", "/option-chain"]);
        assert_eq!(config.server.status_policy, StatusPolicy::Simple);
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("QUOTE_PROXY_WINDOW_SIZE", "many")]).unwrap();
        assert_eq!(config.batch.window_size, 5);
    }

    #[test]
    fn malformed_duration_falls_back_and_names_the_key() {
        let config = config_from(&[("QUOTE_PROXY_DEADLINE_MS", "25s")]).unwrap();
        assert_eq!(config.batch.deadline, Duration::from_secs(25));

        let err = parse_setting::<u64>("QUOTE_PROXY_DEADLINE_MS", "25s").unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidValue { key, .. } if key == "QUOTE_PROXY_DEADLINE_MS"
        ));
        assert!(err.to_string().contains("\"25s\""));
    }

    #[test]
    fn misspelled_status_policy_falls_back_to_detailed() {
        let config = config_from(&[("QUOTE_PROXY_STATUS_POLICY", "simpel")]).unwrap();
        assert_eq!(config.server.status_policy, StatusPolicy::Detailed);
        assert_eq!(StatusPolicy::parse("simpel"), None);
        assert_eq!(StatusPolicy::parse(" Detailed "), Some(StatusPolicy::Detailed));
    }

    #[test]
    fn zero_window_size_is_rejected() {
        let err = config_from(&[("QUOTE_PROXY_WINDOW_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "QUOTE_PROXY_WINDOW_SIZE"));
    }

    #[test]
    fn item_timeout_must_be_shorter_than_session_timeout() {
        let err = config_from(&[
            ("QUOTE_PROXY_ITEM_TIMEOUT_MS", "15000"),
            ("QUOTE_PROXY_SESSION_TIMEOUT_MS", "15000"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = config_from(&[("UPSTREAM_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn empty_navigation_list_is_rejected() {
        let err = config_from(&[("QUOTE_PROXY_NAVIGATION_PATHS", " , ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn orchestrator_settings_mirror_batch_settings() {
        let config = ProxyConfig::default();
        let settings = config.orchestrator_settings();
        assert_eq!(settings.window_size, config.batch.window_size);
        assert_eq!(settings.deadline, config.batch.deadline);
        assert_eq!(settings.source_label, "nse");
    }

    #[test]
    fn status_policy_parsing() {
        assert_eq!(
            StatusPolicy::from_str_case_insensitive("simple"),
            StatusPolicy::Simple
        );
        assert_eq!(
            StatusPolicy::from_str_case_insensitive("anything"),
            StatusPolicy::Detailed
        );
        assert_eq!(StatusPolicy::Simple.as_str(), "simple");
    }
}
