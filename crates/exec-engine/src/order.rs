//! The shared tick-interface seam for governing orders.
//!
//! Governing orders (maker/taker stop-loss, threshold recovery) are
//! independent strategy variants behind one trait instead of an
//! inheritance family: the scheduler drives any of them through
//! `tick()` and reads the same observable state from all of them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use exec_common::{ExecError, Side, Ticker};

use crate::child::{ChildOrder, ExchangeUpdate};
use crate::command::Command;

/// A governing order counts as filled once this share of its start
/// amount is reached; absorbs dust left by exchange rounding.
pub const COMPLETION_FACTOR: Decimal = dec!(0.99999);

/// Errors raised while constructing a governing order. The tick path
/// itself has no fatal error: every in-flight failure degrades to a
/// `Hold` command and is retried on the next tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Pair(#[from] ExecError),

    #[error("cannot derive an execution price from start={start} dest={dest}")]
    UndefinedPrice { start: Decimal, dest: Decimal },

    #[error("order amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("order price must be positive, got {0}")]
    NonPositivePrice(Decimal),
}

/// Lifecycle status of a governing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Still working: an active child exists or will be re-created.
    Open,
    /// Target fill reached; terminal.
    Closed,
}

/// One governing order driven by scheduler ticks.
///
/// A tick carries the exchange's snapshot of the active child order
/// plus optionally one fresh market tick, and yields exactly one
/// [`Command`]. Implementations are synchronous and perform no I/O;
/// the caller must serialize ticks per instance.
pub trait TickDriven {
    /// Advance the state machine by one tick.
    fn tick(&mut self, update: &ExchangeUpdate, ticker: Option<&Ticker>) -> Command;

    fn id(&self) -> Uuid;
    fn symbol(&self) -> String;
    fn side(&self) -> Side;
    fn status(&self) -> OrderStatus;

    /// Markers recording why transitions fired, in insertion order,
    /// without duplicates.
    fn tags(&self) -> &[String];

    /// Total base-currency fill (retired children + active child).
    fn filled(&self) -> Decimal;

    /// Total fill expressed in the start currency.
    fn filled_start_amount(&self) -> Decimal;

    /// Total fill expressed in the destination currency.
    fn filled_dest_amount(&self) -> Decimal;

    /// Average realized conversion price; `None` until both start and
    /// destination fills are non-zero.
    fn filled_price(&self) -> Option<Decimal>;

    /// Retired child orders in retirement order.
    fn history(&self) -> &[ChildOrder];

    /// The currently outstanding child order, if any.
    fn active_child(&self) -> Option<&ChildOrder>;

    /// Serializable view of the observable state.
    fn snapshot(&self) -> OrderSnapshot;
}

/// Point-in-time reporting view of a governing order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub status: OrderStatus,
    /// Phase name of the concrete strategy (e.g. "maker", "best_amount").
    pub phase: String,
    pub tags: Vec<String>,
    pub filled: Decimal,
    pub filled_start_amount: Decimal,
    pub filled_dest_amount: Decimal,
    pub filled_price: Option<Decimal>,
    pub active_child: Option<ChildOrder>,
    pub history: Vec<ChildOrder>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Realized average price of the conversion so far, oriented by side
/// so it is always comparable with the order's limit prices.
/// Undefined until both legs have non-zero fills.
pub(crate) fn realized_price(
    side: Side,
    filled_start: Decimal,
    filled_dest: Decimal,
) -> Option<Decimal> {
    if filled_start == Decimal::ZERO || filled_dest == Decimal::ZERO {
        return None;
    }
    match side {
        Side::Buy => filled_start.checked_div(filled_dest),
        Side::Sell => filled_dest.checked_div(filled_start),
    }
}
