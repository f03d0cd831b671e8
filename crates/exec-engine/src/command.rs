//! The tick-output boundary type.
//!
//! Every tick of a governing order produces exactly one `Command` the
//! scheduler consumes to decide whether to place, poll, or cancel the
//! real exchange order. The closed variant replaces the textual
//! commands of earlier systems so the scheduler boundary never parses
//! strings.

use serde::{Deserialize, Serialize};

/// Instruction emitted by a governing order after one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    /// A new child order was opened; place it and keep ticker data flowing.
    New,
    /// Keep polling the active child order and the symbol's tickers.
    Hold { symbol: String },
    /// Cancel the active child order; keep ticker data flowing.
    Cancel { symbol: String },
    /// The governing order is complete; nothing left to do.
    None,
}

impl Command {
    /// Hold command for a symbol.
    pub fn hold(symbol: impl Into<String>) -> Self {
        Command::Hold {
            symbol: symbol.into(),
        }
    }

    /// Cancel command for a symbol.
    pub fn cancel(symbol: impl Into<String>) -> Self {
        Command::Cancel {
            symbol: symbol.into(),
        }
    }

    /// True only for the terminal no-op command.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::None)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::New => write!(f, "new"),
            Command::Hold { symbol } => write!(f, "hold tickers {symbol}"),
            Command::Cancel { symbol } => write!(f, "cancel tickers {symbol}"),
            Command::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Command::New.to_string(), "new");
        assert_eq!(Command::hold("ADA/ETH").to_string(), "hold tickers ADA/ETH");
        assert_eq!(Command::cancel("ADA/ETH").to_string(), "cancel tickers ADA/ETH");
        assert_eq!(Command::None.to_string(), "");
    }

    #[test]
    fn test_is_terminal() {
        assert!(Command::None.is_terminal());
        assert!(!Command::New.is_terminal());
        assert!(!Command::hold("ADA/ETH").is_terminal());
        assert!(!Command::cancel("ADA/ETH").is_terminal());
    }

    #[test]
    fn test_serde_round_trip() {
        let cmd = Command::cancel("ETH/BTC");
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"cancel\""));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
