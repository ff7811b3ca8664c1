//! Domain Layer - Batch quote types and pure reduction logic.
//!
//! Nothing in this layer performs I/O. Session credentials, per-symbol
//! outcomes and the compiled batch result are plain values that the
//! application layer moves between ports.

/// Upstream endpoint kinds and their path templates.
pub mod endpoint;

/// Per-symbol fetch requests, outcomes and error kinds.
pub mod fetch;

/// Session credential bundle.
pub mod session;

/// Batch result compilation and status selection.
pub mod batch;

use std::collections::HashSet;

use thiserror::Error;

/// Caller input errors, rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// No usable symbol was supplied.
    #[error("at least one symbol is required")]
    EmptySymbols,

    /// The requested endpoint kind does not exist.
    #[error("unknown endpoint '{value}', expected one of: {}", valid.join(", "))]
    UnknownEndpoint {
        /// Value supplied by the caller.
        value: String,
        /// Canonical endpoint names.
        valid: Vec<&'static str>,
    },

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Normalize a raw symbol list: trim, drop empties, deduplicate.
///
/// First occurrence wins, so the output preserves caller order. Case is left
/// untouched.
pub fn normalize_symbols<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|s| {
            let trimmed = s.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_string())).then(|| trimmed.to_string())
        })
        .collect()
}

/// Split a comma-separated symbol parameter and normalize it.
#[must_use]
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    normalize_symbols(raw.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_drops_empty_entries() {
        let symbols = parse_symbol_list(" RELIANCE, ,TCS,,  INFY ");
        assert_eq!(symbols, vec!["RELIANCE", "TCS", "INFY"]);
    }

    #[test]
    fn normalize_deduplicates_preserving_first_occurrence() {
        let symbols = normalize_symbols(["TCS", "RELIANCE", " TCS", "RELIANCE"]);
        assert_eq!(symbols, vec!["TCS", "RELIANCE"]);
    }

    #[test]
    fn normalize_preserves_case() {
        let symbols = normalize_symbols(["tcs", "TCS"]);
        assert_eq!(symbols, vec!["tcs", "TCS"]);
    }

    #[test]
    fn empty_input_normalizes_to_nothing() {
        assert!(parse_symbol_list("").is_empty());
        assert!(parse_symbol_list(" , ,").is_empty());
    }

    #[test]
    fn unknown_endpoint_message_lists_names() {
        let err = InputError::UnknownEndpoint {
            value: "x".to_string(),
            valid: vec!["quote", "chart"],
        };
        assert_eq!(
            err.to_string(),
            "unknown endpoint 'x', expected one of: quote, chart"
        );
    }
}
