//! Market primitives shared across the execution engine.
//!
//! CRITICAL: All prices and quantities use `rust_decimal::Decimal`.
//! NEVER use f64 for financial math.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for pair parsing and currency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("invalid pair symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("currency {currency} is not part of pair {symbol}")]
    CurrencyNotInPair { currency: String, symbol: String },
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trading pair parsed from a `"BASE/QUOTE"` symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    /// Parse a `"BASE/QUOTE"` symbol (e.g. `"ADA/ETH"`).
    pub fn parse(symbol: &str) -> Result<Self, ExecError> {
        let mut parts = symbol.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self {
                    base: base.to_string(),
                    quote: quote.to_string(),
                })
            }
            _ => Err(ExecError::InvalidSymbol(symbol.to_string())),
        }
    }

    /// Base currency (the amount currency of an order).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote currency (the price currency of an order).
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// The canonical `"BASE/QUOTE"` symbol.
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Whether the given currency is one of the pair's legs.
    pub fn contains(&self, currency: &str) -> bool {
        self.base == currency || self.quote == currency
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// One market tick for a single symbol.
///
/// Either side may be absent when the feed delivered only half of the
/// book top; consumers must treat a missing side as "no price".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub ask: Option<Decimal>,
    pub bid: Option<Decimal>,
}

impl Ticker {
    /// Tick with both sides present.
    pub fn new(ask: Decimal, bid: Decimal) -> Self {
        Self {
            ask: Some(ask),
            bid: Some(bid),
        }
    }

    /// Tick carrying only the bid side.
    pub fn bid_only(bid: Decimal) -> Self {
        Self {
            ask: None,
            bid: Some(bid),
        }
    }

    /// Tick carrying only the ask side.
    pub fn ask_only(ask: Decimal) -> Self {
        Self {
            ask: Some(ask),
            bid: None,
        }
    }
}
