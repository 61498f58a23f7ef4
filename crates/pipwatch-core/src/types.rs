//! Market data snapshots: ticks and candles.

use crate::{Price, Side, Symbol, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One quote update for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    pub bid: Price,
    pub ask: Price,
    /// Broker server time of the quote.
    pub server_time: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: Symbol, bid: Price, ask: Price, server_time: DateTime<Utc>) -> Self {
        Self {
            symbol,
            bid,
            ask,
            server_time,
        }
    }

    /// Price at which a position of `side` would be closed right now:
    /// longs close at bid, shorts at ask.
    pub fn close_price(&self, side: Side) -> Price {
        match side {
            Side::Buy => self.bid,
            Side::Sell => self.ask,
        }
    }

    /// Current spread in price units.
    pub fn spread(&self) -> Decimal {
        self.ask.inner() - self.bid.inner()
    }

    /// Both sides quoted with bid below ask.
    pub fn is_valid(&self) -> bool {
        self.bid.is_positive() && self.ask.is_positive() && self.bid < self.ask
    }
}

/// One OHLC bar for a symbol/timeframe.
///
/// `is_closed` distinguishes the forming bar from completed history;
/// a "new closed candle" event fires exactly once when the latest
/// closed bar's `close_time` advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub close_time: DateTime<Utc>,
    pub is_closed: bool,
}

impl Candle {
    /// Bar body direction: positive for bullish, negative for bearish.
    pub fn body(&self) -> Decimal {
        self.close.inner() - self.open.inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(bid: Decimal, ask: Decimal) -> Tick {
        Tick::new(
            Symbol::from("EURUSD"),
            Price::new(bid),
            Price::new(ask),
            Utc::now(),
        )
    }

    #[test]
    fn test_close_price_by_side() {
        let t = tick(dec!(1.1000), dec!(1.1002));
        assert_eq!(t.close_price(Side::Buy), Price::new(dec!(1.1000)));
        assert_eq!(t.close_price(Side::Sell), Price::new(dec!(1.1002)));
    }

    #[test]
    fn test_spread() {
        let t = tick(dec!(1.1000), dec!(1.1002));
        assert_eq!(t.spread(), dec!(0.0002));
    }

    #[test]
    fn test_tick_validity() {
        assert!(tick(dec!(1.1000), dec!(1.1002)).is_valid());
        // Crossed quote
        assert!(!tick(dec!(1.1002), dec!(1.1000)).is_valid());
        // Missing bid
        assert!(!tick(dec!(0), dec!(1.1000)).is_valid());
    }
}
