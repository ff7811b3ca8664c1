//! Upstream Endpoint Kinds
//!
//! Every data request targets exactly one upstream path template. The set of
//! kinds is closed: an unrecognised name is a caller input error, reported
//! before any network activity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::InputError;

/// Kind of upstream data endpoint a batch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointKind {
    /// Equity quote for a single listed symbol.
    #[default]
    Quote,
    /// Trade-info section of the equity quote (order book, delivery data).
    TradeInfo,
    /// Constituents and values of a market index.
    Indices,
    /// Pre-open session snapshot for a market segment key.
    Preopen,
    /// Market open/close status. The symbol is only used as the result key.
    MarketStatus,
    /// Option chain for an index or stock.
    OptionChain,
    /// Intraday chart series.
    Chart,
}

impl EndpointKind {
    /// All endpoint kinds, in the order they are listed to callers.
    pub const ALL: [Self; 7] = [
        Self::Quote,
        Self::TradeInfo,
        Self::Indices,
        Self::Preopen,
        Self::MarketStatus,
        Self::OptionChain,
        Self::Chart,
    ];

    /// Canonical name used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::TradeInfo => "tradeInfo",
            Self::Indices => "indices",
            Self::Preopen => "preopen",
            Self::MarketStatus => "marketStatus",
            Self::OptionChain => "optionChain",
            Self::Chart => "chart",
        }
    }

    /// Upstream path for this kind.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Quote | Self::TradeInfo => "/api/quote-equity",
            Self::Indices => "/api/equity-stockIndices",
            Self::Preopen => "/api/market-data-pre-open",
            Self::MarketStatus => "/api/marketStatus",
            Self::OptionChain => "/api/option-chain-indices",
            Self::Chart => "/api/chart-databyindex",
        }
    }

    /// Query parameters for `symbol`, unencoded.
    #[must_use]
    pub fn query(&self, symbol: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::Quote | Self::OptionChain => vec![("symbol", symbol.to_string())],
            Self::TradeInfo => vec![
                ("symbol", symbol.to_string()),
                ("section", "trade_info".to_string()),
            ],
            Self::Indices => vec![("index", symbol.to_string())],
            Self::Preopen => vec![("key", symbol.to_string())],
            Self::MarketStatus => Vec::new(),
            Self::Chart => vec![("index", format!("{symbol}EQN"))],
        }
    }

    /// Whether the upstream rejects this kind outright without session cookies.
    ///
    /// Kinds that return `false` are still attempted after a failed session
    /// establishment, with a higher individual failure rate.
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        matches!(self, Self::OptionChain | Self::Chart)
    }

    /// Canonical names of every kind, for usage hints.
    #[must_use]
    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::as_str).collect()
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "quote" | "equity" => Ok(Self::Quote),
            "tradeinfo" => Ok(Self::TradeInfo),
            "indices" | "index" => Ok(Self::Indices),
            "preopen" => Ok(Self::Preopen),
            "marketstatus" => Ok(Self::MarketStatus),
            "optionchain" => Ok(Self::OptionChain),
            "chart" => Ok(Self::Chart),
            _ => Err(InputError::UnknownEndpoint {
                value: s.to_string(),
                valid: Self::valid_names(),
            }),
        }
    }
}
