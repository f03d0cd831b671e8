//! Pure price evaluation helpers.
//!
//! These functions make no threshold decisions themselves; the order
//! state machines in `exec-engine` compare their results against
//! configured thresholds. Every helper degrades to `None` (or an
//! explicit error) instead of panicking on bad inputs, so a failed
//! derivation costs the caller one tick, nothing more.

use rust_decimal::Decimal;

use crate::types::{CurrencyPair, ExecError, Side, Ticker};

/// Signed relative difference between a reference price and the
/// current price, oriented so that a positive result means the market
/// moved in the trade's favor since the reference was set.
///
/// - buy:  `(reference - current) / reference`
/// - sell: `(current - reference) / reference`
///
/// Returns `None` when either price is non-positive or the division
/// cannot be performed. Callers must treat `None` as "no threshold
/// decision this tick", never as zero.
pub fn price_diff(side: Side, reference: Decimal, current: Decimal) -> Option<Decimal> {
    if reference <= Decimal::ZERO || current <= Decimal::ZERO {
        return None;
    }
    let delta = match side {
        Side::Buy => reference - current,
        Side::Sell => current - reference,
    };
    delta.checked_div(reference)
}

/// Which side to trade on `pair` in order to end up holding
/// `dest_currency`.
///
/// Selling the base yields the quote; buying the base consumes the
/// quote.
pub fn trade_direction(pair: &CurrencyPair, dest_currency: &str) -> Result<Side, ExecError> {
    if dest_currency == pair.quote() {
        Ok(Side::Sell)
    } else if dest_currency == pair.base() {
        Ok(Side::Buy)
    } else {
        Err(ExecError::CurrencyNotInPair {
            currency: dest_currency.to_string(),
            symbol: pair.symbol(),
        })
    }
}

/// Limit price that would convert `start_amount` of the start currency
/// into exactly `dest_amount` of the destination currency.
///
/// For a sell the price is quoted in dest per start
/// (`dest / start`); for a buy it is start per dest
/// (`start / dest`). Returns `None` when the denominator is
/// non-positive.
pub fn price_for_dest_amount(
    side: Side,
    start_amount: Decimal,
    dest_amount: Decimal,
) -> Option<Decimal> {
    match side {
        Side::Sell => {
            if start_amount <= Decimal::ZERO {
                return None;
            }
            dest_amount.checked_div(start_amount)
        }
        Side::Buy => {
            if dest_amount <= Decimal::ZERO {
                return None;
            }
            start_amount.checked_div(dest_amount)
        }
    }
}

/// Execution prices for one order side derived from a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPrices {
    /// Price for immediate (taker) execution.
    pub taker: Option<Decimal>,
    /// Price for passive (maker) placement.
    pub maker: Option<Decimal>,
}

/// Translate a tick into taker/maker execution prices for a side.
///
/// A seller hits the bid to execute immediately and rests at the ask
/// to make; a buyer does the opposite. Missing or non-positive tick
/// sides yield `None` for the corresponding price.
pub fn order_prices_from_ticker(side: Side, ticker: &Ticker) -> OrderPrices {
    let ask = ticker.ask.filter(|p| *p > Decimal::ZERO);
    let bid = ticker.bid.filter(|p| *p > Decimal::ZERO);
    match side {
        Side::Sell => OrderPrices {
            taker: bid,
            maker: ask,
        },
        Side::Buy => OrderPrices {
            taker: ask,
            maker: bid,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ========================================================================
    // price_diff
    // ========================================================================

    #[test]
    fn test_price_diff_buy() {
        // Price moved up against a buyer.
        assert_eq!(price_diff(Side::Buy, dec!(1), dec!(1.1)), Some(dec!(-0.1)));
        assert_eq!(price_diff(Side::Buy, dec!(1), dec!(1.01)), Some(dec!(-0.01)));
        // Price moved down in the buyer's favor.
        assert_eq!(price_diff(Side::Buy, dec!(1), dec!(0.9)), Some(dec!(0.1)));
    }

    #[test]
    fn test_price_diff_sell() {
        assert_eq!(price_diff(Side::Sell, dec!(1), dec!(0.9)), Some(dec!(-0.1)));
        assert_eq!(price_diff(Side::Sell, dec!(1), dec!(0.99)), Some(dec!(-0.01)));
        assert_eq!(price_diff(Side::Sell, dec!(1), dec!(1.1)), Some(dec!(0.1)));
    }

    #[test]
    fn test_price_diff_zero_when_equal() {
        assert_eq!(price_diff(Side::Buy, dec!(2), dec!(2)), Some(Decimal::ZERO));
        assert_eq!(price_diff(Side::Sell, dec!(2), dec!(2)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_price_diff_undefined_on_non_positive() {
        assert_eq!(price_diff(Side::Buy, Decimal::ZERO, dec!(1)), None);
        assert_eq!(price_diff(Side::Buy, dec!(1), Decimal::ZERO), None);
        assert_eq!(price_diff(Side::Sell, dec!(-1), dec!(1)), None);
        assert_eq!(price_diff(Side::Sell, dec!(1), dec!(-1)), None);
    }

    // ========================================================================
    // trade_direction
    // ========================================================================

    #[test]
    fn test_trade_direction() {
        let pair = CurrencyPair::parse("ADA/ETH").unwrap();
        assert_eq!(trade_direction(&pair, "ETH").unwrap(), Side::Sell);
        assert_eq!(trade_direction(&pair, "ADA").unwrap(), Side::Buy);
    }

    #[test]
    fn test_trade_direction_unknown_currency() {
        let pair = CurrencyPair::parse("ADA/ETH").unwrap();
        let err = trade_direction(&pair, "BTC").unwrap_err();
        assert_eq!(
            err,
            ExecError::CurrencyNotInPair {
                currency: "BTC".to_string(),
                symbol: "ADA/ETH".to_string(),
            }
        );
    }

    // ========================================================================
    // price_for_dest_amount
    // ========================================================================

    #[test]
    fn test_price_for_dest_amount_sell() {
        // Selling 1000 ADA for 0.32485131 ETH.
        let price = price_for_dest_amount(Side::Sell, dec!(1000), dec!(0.32485131));
        assert_eq!(price, Some(dec!(0.00032485131)));
    }

    #[test]
    fn test_price_for_dest_amount_buy() {
        // Buying 1000 ADA with 0.32485131 ETH.
        let price = price_for_dest_amount(Side::Buy, dec!(0.32485131), dec!(1000));
        assert_eq!(price, Some(dec!(0.00032485131)));
    }

    #[test]
    fn test_price_for_dest_amount_guards_zero() {
        assert_eq!(price_for_dest_amount(Side::Sell, Decimal::ZERO, dec!(1)), None);
        assert_eq!(price_for_dest_amount(Side::Buy, dec!(1), Decimal::ZERO), None);
    }

    // ========================================================================
    // order_prices_from_ticker
    // ========================================================================

    #[test]
    fn test_order_prices_sell_hits_bid() {
        let ticker = Ticker::new(dec!(0.00032487), dec!(0.00032483));
        let prices = order_prices_from_ticker(Side::Sell, &ticker);
        assert_eq!(prices.taker, Some(dec!(0.00032483)));
        assert_eq!(prices.maker, Some(dec!(0.00032487)));
    }

    #[test]
    fn test_order_prices_buy_lifts_ask() {
        let ticker = Ticker::new(dec!(0.00032487), dec!(0.00032483));
        let prices = order_prices_from_ticker(Side::Buy, &ticker);
        assert_eq!(prices.taker, Some(dec!(0.00032487)));
        assert_eq!(prices.maker, Some(dec!(0.00032483)));
    }

    #[test]
    fn test_order_prices_missing_sides() {
        let ticker = Ticker::bid_only(dec!(0.1));
        let prices = order_prices_from_ticker(Side::Sell, &ticker);
        assert_eq!(prices.taker, Some(dec!(0.1)));
        assert_eq!(prices.maker, None);

        let prices = order_prices_from_ticker(Side::Buy, &ticker);
        assert_eq!(prices.taker, None);
        assert_eq!(prices.maker, Some(dec!(0.1)));
    }

    #[test]
    fn test_order_prices_filter_non_positive() {
        let ticker = Ticker::new(Decimal::ZERO, dec!(-1));
        let prices = order_prices_from_ticker(Side::Sell, &ticker);
        assert_eq!(prices.taker, None);
        assert_eq!(prices.maker, None);
    }
}
