//! Accumulate-and-retire fill bookkeeping.
//!
//! The ledger is written once and shared by every governing order
//! strategy: a retired child's contribution folds into the running
//! totals exactly at retirement, never twice, and the live fill of the
//! active child is added on top when totals are read.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::child::ChildOrder;

/// Running merge of retired child orders plus an ordered history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FillLedger {
    filled: Decimal,
    cost: Decimal,
    history: Vec<ChildOrder>,
}

impl FillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished child's contribution into the totals and append
    /// it to the history. Each child must be retired exactly once.
    pub fn retire(&mut self, child: ChildOrder) {
        self.filled += child.filled;
        self.cost += child.cost;
        self.history.push(child);
    }

    /// Total base-currency fill across retired children.
    pub fn filled(&self) -> Decimal {
        self.filled
    }

    /// Total quote-currency amount across retired children.
    pub fn cost(&self) -> Decimal {
        self.cost
    }

    /// Retired children, in retirement order.
    pub fn history(&self) -> &[ChildOrder] {
        &self.history
    }

    /// Retired totals plus the live fill of the active child.
    pub fn filled_with(&self, active: Option<&ChildOrder>) -> Decimal {
        self.filled + active.map_or(Decimal::ZERO, |c| c.filled)
    }

    /// Retired cost plus the live cost of the active child.
    pub fn cost_with(&self, active: Option<&ChildOrder>) -> Decimal {
        self.cost + active.map_or(Decimal::ZERO, |c| c.cost)
    }
}
