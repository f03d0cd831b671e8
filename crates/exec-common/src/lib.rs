//! Shared types and price math for the execution engine.
//!
//! This crate contains:
//! - Market primitives (`Side`, `CurrencyPair`, `Ticker`)
//! - Pure price evaluation helpers (relative price difference,
//!   trade direction, execution prices derived from tickers)
//!
//! Everything here is side-effect free and owns no exchange state; the
//! order state machines in `exec-engine` build on these leaves.

pub mod price;
pub mod types;

pub use price::{order_prices_from_ticker, price_diff, price_for_dest_amount, trade_direction, OrderPrices};
pub use types::{CurrencyPair, ExecError, Side, Ticker};
