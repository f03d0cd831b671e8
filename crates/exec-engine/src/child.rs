//! The child order model.
//!
//! A child order is one concrete outstanding exchange order currently
//! representing a governing order's unfilled remainder. The engine
//! never talks to the exchange itself; it only consumes the cumulative
//! fill snapshots the scheduler relays back each tick.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use exec_common::Side;

/// Exchange-reported status of a child order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildStatus {
    Open,
    Closed,
    Canceled,
}

impl ChildStatus {
    /// Closed and canceled orders never change again.
    pub fn is_final(&self) -> bool {
        matches!(self, ChildStatus::Closed | ChildStatus::Canceled)
    }
}

/// Execution style a child order was created with.
///
/// Recorded immutably at construction so reporting can tell which
/// phase of the governing order spawned the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStyle {
    Maker,
    Taker,
    BestAmount,
    MarketPrice,
}

/// One exchange response for the active child order.
///
/// `filled` and `cost` are cumulative for the child's lifetime.
/// Exchanges may omit either field on some responses (typically
/// cancellation confirmations); the previously reported values then
/// stay in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeUpdate {
    pub status: ChildStatus,
    pub filled: Option<Decimal>,
    pub cost: Option<Decimal>,
}

impl ExchangeUpdate {
    /// Open order snapshot with cumulative fill and cost.
    pub fn open(filled: Decimal, cost: Decimal) -> Self {
        Self {
            status: ChildStatus::Open,
            filled: Some(filled),
            cost: Some(cost),
        }
    }

    /// Fully reported close.
    pub fn closed(filled: Decimal, cost: Decimal) -> Self {
        Self {
            status: ChildStatus::Closed,
            filled: Some(filled),
            cost: Some(cost),
        }
    }

    /// Cancellation confirmation that carries no fill data.
    pub fn canceled() -> Self {
        Self {
            status: ChildStatus::Canceled,
            filled: None,
            cost: None,
        }
    }

    /// Status-only response; previously reported amounts persist.
    pub fn status_only(status: ChildStatus) -> Self {
        Self {
            status,
            filled: None,
            cost: None,
        }
    }

    /// Attach a cumulative fill amount.
    pub fn with_filled(mut self, filled: Decimal) -> Self {
        self.filled = Some(filled);
        self
    }

    /// Attach a cumulative cost amount.
    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// A single concrete exchange order tracked by a governing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildOrder {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub style: ExecStyle,
    /// Target amount in base currency.
    pub amount: Decimal,
    /// Limit price in quote currency.
    pub price: Decimal,
    /// Cumulative filled amount in base currency.
    pub filled: Decimal,
    /// Cumulative spent/received amount in quote currency.
    pub cost: Decimal,
    /// Number of exchange responses applied to this child.
    pub update_count: u32,
    pub status: ChildStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChildOrder {
    /// Open a new child order.
    pub fn new(symbol: &str, side: Side, style: ExecStyle, amount: Decimal, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            style,
            amount,
            price,
            filled: Decimal::ZERO,
            cost: Decimal::ZERO,
            update_count: 0,
            status: ChildStatus::Open,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Merge one exchange response into the child's state.
    pub fn apply(&mut self, update: &ExchangeUpdate) {
        self.status = update.status;
        if let Some(filled) = update.filled {
            self.filled = filled;
        }
        if let Some(cost) = update.cost {
            self.cost = cost;
        }
        self.update_count += 1;
        if self.status.is_final() && self.closed_at.is_none() {
            self.closed_at = Some(Utc::now());
        }
    }

    /// Base-currency amount still unfilled.
    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled
    }

    /// Whether the exchange will never update this order again.
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}
