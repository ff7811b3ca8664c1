//! Credential Accumulation
//!
//! Pure parsing helpers for the credentials handed out during navigation:
//! `Set-Cookie` headers and tokens embedded in page bodies. Neither parser
//! fails; unrecognized input yields nothing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::session::SessionContext;

/// `name: "value"`, `"name": "value"` or `name = 'value'`.
#[allow(clippy::expect_used)]
static EMBEDDED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b([A-Za-z_][A-Za-z0-9_]*)["']?\s*[:=]\s*["']([^"'\r\n]+)["']"#)
        .expect("embedded token pattern is valid")
});

/// A single `Set-Cookie` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieUpdate {
    /// Cookie name.
    pub name: String,
    /// Cookie value. Empty means the upstream cleared the cookie.
    pub value: String,
}

/// Parse the `name=value` pair of a `Set-Cookie` header value.
///
/// Attributes after the first `;` are ignored. Returns `None` for an empty
/// name or a value without `=`.
#[must_use]
pub fn parse_set_cookie(header: &str) -> Option<CookieUpdate> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(CookieUpdate {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
    })
}

/// Scan a page body for allow-listed embedded tokens.
///
/// Matches are returned in document order; a name may appear more than
/// once. Empty when nothing matches.
#[must_use]
pub fn extract_embedded_tokens(body: &str, names: &[String]) -> Vec<(String, String)> {
    if names.is_empty() {
        return Vec::new();
    }
    EMBEDDED_TOKEN
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str();
            names
                .iter()
                .any(|n| n == name)
                .then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Accumulates credentials across navigation steps, last write wins.
#[derive(Debug, Default, Clone)]
pub struct CredentialJar {
    entries: BTreeMap<String, String>,
}

impl CredentialJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `Set-Cookie` update. An empty value removes the name.
    pub fn apply(&mut self, update: CookieUpdate) {
        if update.value.is_empty() {
            self.entries.remove(&update.name);
        } else {
            self.entries.insert(update.name, update.value);
        }
    }

    /// Merge every `Set-Cookie` header value.
    pub fn absorb_set_cookies<'a>(&mut self, headers: impl IntoIterator<Item = &'a str>) {
        for update in headers.into_iter().filter_map(parse_set_cookie) {
            self.apply(update);
        }
    }

    /// Merge allow-listed tokens found in a page body.
    pub fn absorb_body_tokens(&mut self, body: &str, names: &[String]) {
        for (name, value) in extract_embedded_tokens(body, names) {
            self.entries.insert(name, value);
        }
    }

    /// `Cookie` header for the credentials held so far.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Whether no credential has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the jar into a session.
    #[must_use]
    pub fn into_session(self) -> SessionContext {
        SessionContext::new(self.entries)
    }
}
