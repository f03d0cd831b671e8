//! Best-price recovery order with a market-price fallback.
//!
//! Tries to convert a start-currency amount into a target destination
//! amount at the implied best price. While the first child works, each
//! tick compares the current taker price against that best price; a
//! drop past `taker_price_threshold` (or a stalled child) replaces the
//! child. Once any child retires unfilled the order degrades to the
//! market-price phase for good and runs consecutive taker-priced
//! children until the start amount is converted.
//!
//! Phase order is monotonic: best_amount -> market_price, never back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use exec_common::{
    order_prices_from_ticker, price_diff, price_for_dest_amount, trade_direction, CurrencyPair,
    Side, Ticker,
};

use crate::child::{ChildOrder, ChildStatus, ExchangeUpdate, ExecStyle};
use crate::command::Command;
use crate::ledger::FillLedger;
use crate::order::{realized_price, EngineError, OrderSnapshot, OrderStatus, TickDriven, COMPLETION_FACTOR};

/// Marker set when the market dropped past the recovery threshold.
pub const TAG_BELOW_THRESHOLD: &str = "below_threshold";

/// Execution phase of a [`ThresholdRecoveryOrder`]. One-directional:
/// market_price is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    BestAmount,
    MarketPrice,
}

impl RecoveryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryPhase::BestAmount => "best_amount",
            RecoveryPhase::MarketPrice => "market_price",
        }
    }
}

/// Thresholds and update budgets for a [`ThresholdRecoveryOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Signed relative move of the taker price against `best_price`
    /// that abandons the best-amount child. Negative means unfavorable.
    pub taker_price_threshold: Decimal,
    /// Minimum remaining amount worth cancelling and re-pricing for.
    pub cancel_threshold: Decimal,
    /// Update cap for the best-amount child orders.
    pub max_best_amount_order_updates: u32,
    /// Update cap for each market-price child order.
    pub max_order_updates: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            taker_price_threshold: dec!(-0.01),
            cancel_threshold: dec!(0.000001),
            max_best_amount_order_updates: 50,
            max_order_updates: 10,
        }
    }
}

/// Best-price -> market-price recovery order for a start/destination
/// currency conversion.
#[derive(Debug, Clone)]
pub struct ThresholdRecoveryOrder {
    id: Uuid,
    pair: CurrencyPair,
    side: Side,
    start_currency: String,
    dest_currency: String,
    start_amount: Decimal,
    /// Destination amount the best price was derived from.
    dest_amount: Decimal,
    /// Target amount in base currency.
    amount: Decimal,
    /// Price implying the full destination amount; threshold reference.
    best_price: Decimal,
    config: RecoveryConfig,
    phase: RecoveryPhase,
    status: OrderStatus,
    tags: Vec<String>,
    ledger: FillLedger,
    active: Option<ChildOrder>,
    /// Most recent signed difference of the taker price against
    /// `best_price`; kept for observability.
    last_price_diff: Option<Decimal>,
    last_command: Command,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl ThresholdRecoveryOrder {
    /// Create a recovery order converting `start_amount` of
    /// `start_currency` into `dest_amount` of `dest_currency`, opening
    /// the first best-amount child immediately.
    pub fn new(
        symbol: &str,
        start_currency: &str,
        start_amount: Decimal,
        dest_currency: &str,
        dest_amount: Decimal,
        config: RecoveryConfig,
    ) -> Result<Self, EngineError> {
        let pair = CurrencyPair::parse(symbol)?;
        let side = trade_direction(&pair, dest_currency)?;
        let best_price = price_for_dest_amount(side, start_amount, dest_amount).ok_or(
            EngineError::UndefinedPrice {
                start: start_amount,
                dest: dest_amount,
            },
        )?;
        if best_price <= Decimal::ZERO {
            return Err(EngineError::NonPositivePrice(best_price));
        }
        let amount = match side {
            Side::Sell => start_amount,
            Side::Buy => dest_amount,
        };
        if amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveAmount(amount));
        }
        let active = ChildOrder::new(symbol, side, ExecStyle::BestAmount, amount, best_price);
        let order = Self {
            id: Uuid::new_v4(),
            pair,
            side,
            start_currency: start_currency.to_string(),
            dest_currency: dest_currency.to_string(),
            start_amount,
            dest_amount,
            amount,
            best_price,
            config,
            phase: RecoveryPhase::BestAmount,
            status: OrderStatus::Open,
            tags: Vec::new(),
            ledger: FillLedger::new(),
            active: Some(active),
            last_price_diff: None,
            last_command: Command::New,
            created_at: Utc::now(),
            closed_at: None,
        };
        info!(
            id = %order.id,
            symbol = %order.pair,
            side = %order.side,
            start = %start_amount,
            dest = %dest_amount,
            best_price = %best_price,
            "recovery order opened"
        );
        Ok(order)
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Target amount in base currency.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn start_amount(&self) -> Decimal {
        self.start_amount
    }

    pub fn dest_amount(&self) -> Decimal {
        self.dest_amount
    }

    /// The execution price implying the full destination amount.
    pub fn best_price(&self) -> Decimal {
        self.best_price
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Most recent signed taker-price difference against `best_price`.
    pub fn last_price_diff(&self) -> Option<Decimal> {
        self.last_price_diff
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

    fn enter_market_price(&mut self) {
        if self.phase != RecoveryPhase::MarketPrice {
            self.phase = RecoveryPhase::MarketPrice;
            info!(id = %self.id, symbol = %self.pair, "entering market price phase");
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
        // Track how far the taker price drifted from the best price on
        // every best-amount tick, whatever the tick decides.
        let diff_this_tick = match self.phase {
            RecoveryPhase::BestAmount => ticker.and_then(|t| {
                order_prices_from_ticker(self.side, t)
                    .taker
                    .and_then(|price| price_diff(self.side, self.best_price, price))
            }),
            RecoveryPhase::MarketPrice => None,
        };
        if let Some(diff) = diff_this_tick {
            self.last_price_diff = Some(diff);
        }

        let cap = match self.phase {
            RecoveryPhase::BestAmount => self.config.max_best_amount_order_updates,
            RecoveryPhase::MarketPrice => self.config.max_order_updates,
        };
        if child_updates >= cap && child_remaining > self.config.cancel_threshold {
            debug!(id = %self.id, updates = child_updates, cap, "child order stalled, replacing");
            return Command::cancel(self.symbol());
        }

        if let Some(diff) = diff_this_tick {
            if diff <= self.config.taker_price_threshold {
                debug!(
                    id = %self.id,
                    diff = %diff,
                    threshold = %self.config.taker_price_threshold,
                    "taker price past recovery threshold"
                );
                self.add_tag(TAG_BELOW_THRESHOLD);
                // Only the child is replaced; the phase downgrade
                // happens at retirement.
                return Command::cancel(self.symbol());
            }
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
                "recovery order filled"
            );
            return Command::None;
        }

        self.enter_market_price();

        let Some(ticker) = ticker else {
            return Command::hold(self.symbol());
        };
        let Some(price) = order_prices_from_ticker(self.side, ticker).taker else {
            warn!(id = %self.id, symbol = %self.pair, "no usable price in tick, holding");
            return Command::hold(self.symbol());
        };

        let remaining = self.remaining();
        let child = ChildOrder::new(&self.symbol(), self.side, ExecStyle::MarketPrice, remaining, price);
        debug!(
            id = %self.id,
            child_id = %child.id,
            amount = %remaining,
            price = %price,
            "opening market price child order"
        );
        self.active = Some(child);
        Command::New
    }
}

impl TickDriven for ThresholdRecoveryOrder {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> ThresholdRecoveryOrder {
        ThresholdRecoveryOrder::new(
            "ADA/ETH",
            "ADA",
            dec!(1000),
            "ETH",
            dec!(0.32485131),
            RecoveryConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_derives_side_and_best_price() {
        let ro = order();
        assert_eq!(ro.side(), Side::Sell);
        assert_eq!(ro.amount(), dec!(1000));
        assert_eq!(ro.best_price(), dec!(0.00032485131));
        assert_eq!(ro.phase(), RecoveryPhase::BestAmount);
        assert_eq!(ro.status(), OrderStatus::Open);
        assert_eq!(ro.last_command(), &Command::New);

        let child = ro.active_child().unwrap();
        assert_eq!(child.style, ExecStyle::BestAmount);
        assert_eq!(child.amount, dec!(1000));
        assert_eq!(child.price, dec!(0.00032485131));
        assert_eq!(child.side, Side::Sell);
    }

    #[test]
    fn test_create_buy_direction() {
        // Start from the quote currency: a buy of the base.
        let ro = ThresholdRecoveryOrder::new(
            "ADA/ETH",
            "ETH",
            dec!(0.32485131),
            "ADA",
            dec!(1000),
            RecoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(ro.side(), Side::Buy);
        assert_eq!(ro.amount(), dec!(1000));
        assert_eq!(ro.best_price(), dec!(0.00032485131));
    }

    #[test]
    fn test_create_rejects_bad_inputs() {
        let cfg = RecoveryConfig::default;
        assert!(ThresholdRecoveryOrder::new("ADAETH", "ADA", dec!(1), "ETH", dec!(1), cfg()).is_err());
        assert!(ThresholdRecoveryOrder::new("ADA/ETH", "ADA", dec!(1), "BTC", dec!(1), cfg()).is_err());
        assert!(ThresholdRecoveryOrder::new("ADA/ETH", "ADA", dec!(0), "ETH", dec!(1), cfg()).is_err());
        assert!(ThresholdRecoveryOrder::new("ADA/ETH", "ADA", dec!(1), "ETH", dec!(0), cfg()).is_err());
    }

    #[test]
    fn test_partial_fill_without_ticker_holds() {
        let mut ro = order();
        let cmd = ro.tick(&ExchangeUpdate::open(dec!(500), dec!(0.162425655)), None);

        assert_eq!(cmd, Command::hold("ADA/ETH"));
        assert_eq!(ro.filled_start_amount(), dec!(500));
        assert_eq!(ro.filled(), dec!(500));
        assert_eq!(ro.phase(), RecoveryPhase::BestAmount);
        assert_eq!(ro.filled_price(), Some(dec!(0.00032485131)));
        assert_eq!(ro.last_price_diff(), None);
    }

    #[test]
    fn test_price_diff_cached_every_tick() {
        let mut ro = order();
        let update = ExchangeUpdate::open(dec!(500), dec!(0.162425655));
        let ticker = Ticker::new(dec!(0.00032487), dec!(0.00032483));
        let cmd = ro.tick(&update, Some(&ticker));

        assert_eq!(cmd, Command::hold("ADA/ETH"));
        let diff = ro.last_price_diff().unwrap();
        // (bid - best) / best
        let expected = (dec!(0.00032483) - dec!(0.00032485131)) / dec!(0.00032485131);
        assert_eq!(diff, expected);
    }

    #[test]
    fn test_threshold_cancel_keeps_best_amount_phase() {
        let mut ro = ThresholdRecoveryOrder::new(
            "ADA/ETH",
            "ADA",
            dec!(1000),
            "ETH",
            dec!(0.32485131),
            RecoveryConfig {
                taker_price_threshold: dec!(-0.02),
                ..RecoveryConfig::default()
            },
        )
        .unwrap();

        let update = ExchangeUpdate::open(dec!(500), dec!(0.162425655));
        // Bid 2.1% below best price.
        let ticker = Ticker::bid_only(dec!(0.00032485131) * dec!(0.979));
        let cmd = ro.tick(&update, Some(&ticker));

        assert_eq!(cmd, Command::cancel("ADA/ETH"));
        assert!(ro.tags().contains(&TAG_BELOW_THRESHOLD.to_string()));
        assert_eq!(ro.phase(), RecoveryPhase::BestAmount);
        assert_eq!(ro.last_price_diff(), Some(dec!(-0.021)));
    }

    #[test]
    fn test_threshold_cancel_buy_side() {
        let mut ro = ThresholdRecoveryOrder::new(
            "ADA/ETH",
            "ETH",
            dec!(0.32485131),
            "ADA",
            dec!(1000),
            RecoveryConfig {
                taker_price_threshold: dec!(-0.02),
                ..RecoveryConfig::default()
            },
        )
        .unwrap();

        let update = ExchangeUpdate::open(dec!(500), dec!(0.162425655));
        // Ask 2.1% above best price: unfavorable for a buyer.
        let ticker = Ticker::ask_only(dec!(0.00032485131) * dec!(1.021));
        let cmd = ro.tick(&update, Some(&ticker));

        assert_eq!(cmd, Command::cancel("ADA/ETH"));
        assert!(ro.tags().contains(&TAG_BELOW_THRESHOLD.to_string()));
        assert_eq!(ro.last_price_diff(), Some(dec!(-0.021)));
    }

    #[test]
    fn test_tag_not_duplicated_on_repeated_trigger() {
        let mut ro = order();
        let update = ExchangeUpdate::open(dec!(0), dec!(0));
        let ticker = Ticker::bid_only(dec!(0.00032485131) * dec!(0.979));
        for _ in 0..3 {
            ro.tick(&update, Some(&ticker));
        }
        assert_eq!(ro.tags(), &[TAG_BELOW_THRESHOLD.to_string()]);
    }

    #[test]
    fn test_missing_taker_side_makes_no_decision() {
        let mut ro = order();
        // A seller needs the bid; an ask-only tick carries no taker price.
        let ticker = Ticker::ask_only(dec!(0.0001));
        let cmd = ro.tick(&ExchangeUpdate::open(dec!(0), dec!(0)), Some(&ticker));
        assert_eq!(cmd, Command::hold("ADA/ETH"));
        assert!(ro.tags().is_empty());
        assert_eq!(ro.last_price_diff(), None);
    }

    #[test]
    fn test_retirement_enters_market_price() {
        let mut ro = order();
        ro.tick(&ExchangeUpdate::open(dec!(500), dec!(0.162425655)), None);

        let ticker = Ticker::new(dec!(1), dec!(0.00032483));
        let cmd = ro.tick(&ExchangeUpdate::canceled(), Some(&ticker));

        assert_eq!(cmd, Command::New);
        assert_eq!(ro.phase(), RecoveryPhase::MarketPrice);
        let child = ro.active_child().unwrap();
        assert_eq!(child.price, dec!(0.00032483));
        assert_eq!(child.amount, dec!(500));
        assert_eq!(child.style, ExecStyle::MarketPrice);
        assert_eq!(ro.history().len(), 1);
        assert_eq!(ro.history()[0].status, ChildStatus::Canceled);
    }

    #[test]
    fn test_retirement_without_ticker_retries_next_tick() {
        let mut ro = order();
        ro.tick(&ExchangeUpdate::open(dec!(500), dec!(0.162425655)), None);

        let cmd = ro.tick(&ExchangeUpdate::canceled(), None);
        assert_eq!(cmd, Command::hold("ADA/ETH"));
        assert!(ro.active_child().is_none());
        assert_eq!(ro.phase(), RecoveryPhase::MarketPrice);

        let ticker = Ticker::new(dec!(1), dec!(0.00032483));
        let cmd = ro.tick(&ExchangeUpdate::canceled(), Some(&ticker));
        assert_eq!(cmd, Command::New);
        assert_eq!(ro.active_child().unwrap().amount, dec!(500));
        assert_eq!(ro.history().len(), 1);
    }

    #[test]
    fn test_full_fill_closes_order() {
        let mut ro = order();
        ro.tick(&ExchangeUpdate::open(dec!(500), dec!(0.162425655)), None);

        let cmd = ro.tick(&ExchangeUpdate::closed(dec!(1000), dec!(0.32485131)), None);
        assert_eq!(cmd, Command::None);
        assert_eq!(ro.status(), OrderStatus::Closed);
        assert_eq!(ro.filled(), dec!(1000));
        assert_eq!(ro.filled_start_amount(), dec!(1000));
        assert_eq!(ro.phase(), RecoveryPhase::BestAmount);
        assert_eq!(ro.history().len(), 1);

        // Terminal: further ticks are no-ops.
        assert_eq!(ro.tick(&ExchangeUpdate::open(dec!(0), dec!(0)), None), Command::None);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut ro = order();
        ro.tick(&ExchangeUpdate::open(dec!(500), dec!(0.162425655)), None);

        let snap = ro.snapshot();
        assert_eq!(snap.phase, "best_amount");
        assert_eq!(snap.filled, dec!(500));
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"best_amount\""));
    }
}
