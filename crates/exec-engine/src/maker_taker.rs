//! Maker/taker stop-loss order.
//!
//! Starts passively: a maker child order rests at the target price.
//! While the fill stalls, each tick re-checks the market against two
//! signed thresholds relative to the original target price. When the
//! taker-side price degrades past `taker_price_threshold` (or the
//! lifetime maker update budget runs out) the order downgrades to the
//! taker phase for good and chases immediate execution; a milder
//! maker-side degradation only replaces the resting child at a fresh
//! maker price.
//!
//! Phase order is monotonic: maker -> taker, never back.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use exec_common::{
    order_prices_from_ticker, price_diff, price_for_dest_amount, trade_direction, CurrencyPair,
    Side, Ticker,
};

use crate::child::{ChildOrder, ChildStatus, ExchangeUpdate, ExecStyle};
use crate::command::Command;
use crate::ledger::FillLedger;
use crate::order::{realized_price, EngineError, OrderSnapshot, OrderStatus, TickDriven, COMPLETION_FACTOR};

/// Marker set when the lifetime maker update budget forced the taker phase.
pub const TAG_FORCE_TAKER_MAX_MAKER_UPDATES: &str = "force_taker_max_maker_updates";
/// Marker set when the taker-side price crossed its threshold.
pub const TAG_BELOW_THRESHOLD_TAKER_PRICE: &str = "below_threshold_taker_price";
/// Marker set when the maker-side price crossed its threshold.
pub const TAG_BELOW_THRESHOLD_MAKER: &str = "below_threshold_maker";

/// Execution phase of a [`MakerTakerOrder`]. One-directional: once the
/// order is in the taker phase it never returns to maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MakerTakerPhase {
    Maker,
    Taker,
}

impl MakerTakerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MakerTakerPhase::Maker => "maker",
            MakerTakerPhase::Taker => "taker",
        }
    }
}

/// Thresholds and update budgets for a [`MakerTakerOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakerTakerConfig {
    /// Minimum remaining amount worth cancelling and re-pricing for.
    /// Should cover the exchange's minimum order size plus commission.
    pub cancel_threshold: Decimal,
    /// Signed relative move of the maker-side price that triggers a
    /// re-priced maker child. Negative means unfavorable.
    pub maker_price_threshold: Decimal,
    /// Per-child update cap while in the maker phase.
    pub maker_order_max_updates: u32,
    /// Lifetime cap on maker-phase ticks before the taker phase is forced.
    pub force_taker_updates: u32,
    /// Signed relative move of the taker-side price that forces the
    /// taker phase.
    pub taker_price_threshold: Decimal,
    /// Per-child update cap while in the taker phase.
    pub taker_order_max_updates: u32,
    /// Reserved: accepted for compatibility with existing deployments
    /// but not consulted by any tick-path logic.
    pub threshold_check_after_updates: u32,
}

impl Default for MakerTakerConfig {
    fn default() -> Self {
        Self {
            cancel_threshold: dec!(0.000001),
            maker_price_threshold: dec!(-0.005),
            maker_order_max_updates: 50,
            force_taker_updates: 500,
            taker_price_threshold: dec!(-0.01),
            taker_order_max_updates: 10,
            threshold_check_after_updates: 5,
        }
    }
}

/// Maker -> taker stop-loss order for a direct amount/price trade.
#[derive(Debug, Clone)]
pub struct MakerTakerOrder {
    id: Uuid,
    pair: CurrencyPair,
    side: Side,
    start_currency: String,
    dest_currency: String,
    /// Target amount in base currency.
    amount: Decimal,
    /// Original target price; the threshold reference for the whole
    /// lifetime of the order.
    price: Decimal,
    /// Target amount expressed in the start currency; completion is
    /// measured against this.
    start_amount: Decimal,
    config: MakerTakerConfig,
    phase: MakerTakerPhase,
    status: OrderStatus,
    tags: Vec<String>,
    ledger: FillLedger,
    active: Option<ChildOrder>,
    /// Lifetime count of ticks spent in the maker phase.
    maker_updates: u32,
    last_command: Command,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl MakerTakerOrder {
    /// Create an order for `amount` base currency at `price`, opening
    /// the first maker child immediately.
    pub fn new(
        symbol: &str,
        side: Side,
        amount: Decimal,
        price: Decimal,
        config: MakerTakerConfig,
    ) -> Result<Self, EngineError> {
        let pair = CurrencyPair::parse(symbol)?;
        if amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveAmount(amount));
        }
        if price <= Decimal::ZERO {
            return Err(EngineError::NonPositivePrice(price));
        }
        let (start_currency, dest_currency, start_amount) = match side {
            Side::Sell => (pair.base().to_string(), pair.quote().to_string(), amount),
            Side::Buy => (pair.quote().to_string(), pair.base().to_string(), amount * price),
        };
        let active = ChildOrder::new(symbol, side, ExecStyle::Maker, amount, price);
        let order = Self {
            id: Uuid::new_v4(),
            pair,
            side,
            start_currency,
            dest_currency,
            amount,
            price,
            start_amount,
            config,
            phase: MakerTakerPhase::Maker,
            status: OrderStatus::Open,
            tags: Vec::new(),
            ledger: FillLedger::new(),
            active: Some(active),
            maker_updates: 0,
            last_command: Command::New,
            created_at: Utc::now(),
            closed_at: None,
        };
        info!(
            id = %order.id,
            symbol = %order.pair,
            side = %order.side,
            amount = %amount,
            price = %price,
            "maker/taker order opened"
        );
        Ok(order)
    }

    /// Create an order from a start-currency amount and a target
    /// destination amount; side and reference price are derived from
    /// the pair direction.
    pub fn from_start_amount(
        symbol: &str,
        start_currency: &str,
        start_amount: Decimal,
        dest_currency: &str,
        target_amount: Decimal,
        config: MakerTakerConfig,
    ) -> Result<Self, EngineError> {
        let pair = CurrencyPair::parse(symbol)?;
        let side = trade_direction(&pair, dest_currency)?;
        let price = price_for_dest_amount(side, start_amount, target_amount).ok_or(
            EngineError::UndefinedPrice {
                start: start_amount,
                dest: target_amount,
            },
        )?;
        let amount = match side {
            Side::Sell => start_amount,
            Side::Buy => target_amount,
        };
        let mut order = Self::new(symbol, side, amount, price, config)?;
        order.start_currency = start_currency.to_string();
        order.start_amount = start_amount;
        Ok(order)
    }

    pub fn phase(&self) -> MakerTakerPhase {
        self.phase
    }

    /// Target amount in base currency.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The original target price used as the threshold reference.
    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn start_amount(&self) -> Decimal {
        self.start_amount
    }

    pub fn config(&self) -> &MakerTakerConfig {
        &self.config
    }

    /// Lifetime number of ticks spent in the maker phase.
    pub fn maker_updates(&self) -> u32 {
        self.maker_updates
    }

    /// Command emitted by the most recent tick (or `New` right after
    /// construction).
    pub fn last_command(&self) -> &Command {
        &self.last_command
    }

    /// Base-currency amount not yet filled across all children.
    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled()
    }

    fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }

    fn enter_taker(&mut self, reason: &str) {
        if self.phase != MakerTakerPhase::Taker {
            self.phase = MakerTakerPhase::Taker;
            info!(id = %self.id, symbol = %self.pair, reason, "entering taker phase");
        }
    }

    fn advance(&mut self, update: &ExchangeUpdate, ticker: Option<&Ticker>) -> Command {
        if self.status == OrderStatus::Closed {
            return Command::None;
        }
        if let Some(child) = self.active.as_mut() {
            child.apply(update);
        }
        let child_state = self
            .active
            .as_ref()
            .map(|c| (c.status, c.update_count, c.remaining()));
        match child_state {
            Some((ChildStatus::Open, updates, remaining)) => {
                self.on_open_child(updates, remaining, ticker)
            }
            Some(_) => {
                if let Some(child) = self.active.take() {
                    self.ledger.retire(child);
                }
                self.after_retirement(ticker)
            }
            // The previous child was retired but no tick was available
            // to re-price; try again now.
            None => self.after_retirement(ticker),
        }
    }

    fn on_open_child(
        &mut self,
        child_updates: u32,
        child_remaining: Decimal,
        ticker: Option<&Ticker>,
    ) -> Command {
        match self.phase {
            MakerTakerPhase::Maker => self.on_open_maker(child_updates, child_remaining, ticker),
            MakerTakerPhase::Taker => self.on_open_taker(child_updates, child_remaining),
        }
    }

    fn on_open_maker(
        &mut self,
        child_updates: u32,
        child_remaining: Decimal,
        ticker: Option<&Ticker>,
    ) -> Command {
        self.maker_updates += 1;

        // Lifetime maker budget exhausted: downgrade to taker.
        if self.maker_updates >= self.config.force_taker_updates
            && self.remaining() > self.config.cancel_threshold
        {
            self.add_tag(TAG_FORCE_TAKER_MAX_MAKER_UPDATES);
            self.enter_taker("maker update budget exhausted");
            return Command::cancel(self.symbol());
        }

        // This child sat too long: replace it, still as maker.
        if child_updates >= self.config.maker_order_max_updates
            && child_remaining > self.config.cancel_threshold
        {
            return Command::cancel(self.symbol());
        }

        let Some(ticker) = ticker else {
            return Command::hold(self.symbol());
        };
        let prices = order_prices_from_ticker(self.side, ticker);

        if let Some(taker_price) = prices.taker {
            if let Some(diff) = price_diff(self.side, self.price, taker_price) {
                if diff <= self.config.taker_price_threshold {
                    debug!(
                        id = %self.id,
                        diff = %diff,
                        threshold = %self.config.taker_price_threshold,
                        "taker price past threshold"
                    );
                    self.add_tag(TAG_BELOW_THRESHOLD_TAKER_PRICE);
                    self.enter_taker("taker price past threshold");
                    return Command::cancel(self.symbol());
                }
            }
        }

        if let Some(maker_price) = prices.maker {
            if let Some(diff) = price_diff(self.side, self.price, maker_price) {
                if diff <= self.config.maker_price_threshold {
                    debug!(
                        id = %self.id,
                        diff = %diff,
                        threshold = %self.config.maker_price_threshold,
                        "maker price past threshold, re-pricing maker child"
                    );
                    self.add_tag(TAG_BELOW_THRESHOLD_MAKER);
                    return Command::cancel(self.symbol());
                }
            }
        }

        Command::hold(self.symbol())
    }

    fn on_open_taker(&mut self, child_updates: u32, child_remaining: Decimal) -> Command {
        // Stalled taker child: replace it. Phase stays taker.
        if child_updates >= self.config.taker_order_max_updates
            && child_remaining > self.config.cancel_threshold
        {
            return Command::cancel(self.symbol());
        }
        Command::hold(self.symbol())
    }

    fn after_retirement(&mut self, ticker: Option<&Ticker>) -> Command {
        if self.filled_start_amount() >= self.start_amount * COMPLETION_FACTOR {
            self.status = OrderStatus::Closed;
            self.closed_at = Some(Utc::now());
            info!(
                id = %self.id,
                symbol = %self.pair,
                filled = %self.filled(),
                children = self.ledger.history().len(),
                "maker/taker order filled"
            );
            return Command::None;
        }

        let Some(ticker) = ticker else {
            return Command::hold(self.symbol());
        };
        let prices = order_prices_from_ticker(self.side, ticker);
        let next_price = match self.phase {
            MakerTakerPhase::Maker => prices.maker,
            MakerTakerPhase::Taker => prices.taker,
        };
        let Some(next_price) = next_price else {
            warn!(id = %self.id, symbol = %self.pair, "no usable price in tick, holding");
            return Command::hold(self.symbol());
        };

        let style = match self.phase {
            MakerTakerPhase::Maker => ExecStyle::Maker,
            MakerTakerPhase::Taker => ExecStyle::Taker,
        };
        let remaining = self.remaining();
        let child = ChildOrder::new(&self.symbol(), self.side, style, remaining, next_price);
        debug!(
            id = %self.id,
            child_id = %child.id,
            phase = ?self.phase,
            amount = %remaining,
            price = %next_price,
            "opening replacement child order"
        );
        self.active = Some(child);
        Command::New
    }
}

impl TickDriven for MakerTakerOrder {
    fn tick(&mut self, update: &ExchangeUpdate, ticker: Option<&Ticker>) -> Command {
        let command = self.advance(update, ticker);
        self.last_command = command.clone();
        command
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn symbol(&self) -> String {
        self.pair.symbol()
    }

    fn side(&self) -> Side {
        self.side
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn filled(&self) -> Decimal {
        self.ledger.filled_with(self.active.as_ref())
    }

    fn filled_start_amount(&self) -> Decimal {
        match self.side {
            Side::Sell => self.ledger.filled_with(self.active.as_ref()),
            Side::Buy => self.ledger.cost_with(self.active.as_ref()),
        }
    }

    fn filled_dest_amount(&self) -> Decimal {
        match self.side {
            Side::Sell => self.ledger.cost_with(self.active.as_ref()),
            Side::Buy => self.ledger.filled_with(self.active.as_ref()),
        }
    }

    fn filled_price(&self) -> Option<Decimal> {
        realized_price(self.side, self.filled_start_amount(), self.filled_dest_amount())
    }

    fn history(&self) -> &[ChildOrder] {
        self.ledger.history()
    }

    fn active_child(&self) -> Option<&ChildOrder> {
        self.active.as_ref()
    }

    fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            symbol: self.symbol(),
            side: self.side,
            status: self.status,
            phase: self.phase.as_str().to_string(),
            tags: self.tags.clone(),
            filled: self.filled(),
            filled_start_amount: self.filled_start_amount(),
            filled_dest_amount: self.filled_dest_amount(),
            filled_price: self.filled_price(),
            active_child: self.active.clone(),
            history: self.ledger.history().to_vec(),
            created_at: self.created_at,
            closed_at: self.closed_at,
        }
    }
}
