//! Broker position records and exit actions.
//!
//! Position snapshots arrive from the broker with fields that may be
//! absent or unparseable depending on the account/terminal. The raw
//! [`PositionSnapshot`] keeps everything optional; [`PositionView`]
//! is the validated form the exit engine works with. A snapshot that
//! fails validation is skipped for that evaluation cycle — never an
//! error — and retried naturally on the next cycle from fresh data.

use crate::{Price, Symbol, Volume};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique identifier of an open position or pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(pub u64);

impl Ticket {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position direction. Buy = long, Sell = short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The order side that closes a position of this side.
    pub fn closing(&self) -> Side {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Raw position record as reported by the broker.
///
/// Every field is optional; validation happens in [`PositionView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticket: Option<Ticket>,
    pub symbol: Option<Symbol>,
    pub side: Option<Side>,
    pub entry_price: Option<Price>,
    pub volume: Option<Volume>,
    /// Floating profit in account currency, signed.
    pub profit: Option<Decimal>,
}

impl PositionSnapshot {
    /// Fully-populated snapshot, the common case in tests and the
    /// simulated broker.
    pub fn filled(
        ticket: Ticket,
        symbol: Symbol,
        side: Side,
        entry_price: Price,
        volume: Volume,
        profit: Decimal,
    ) -> Self {
        Self {
            ticket: Some(ticket),
            symbol: Some(symbol),
            side: Some(side),
            entry_price: Some(entry_price),
            volume: Some(volume),
            profit: Some(profit),
        }
    }
}

/// Validated view over a [`PositionSnapshot`].
///
/// Ticket, symbol, side, entry price and volume are required; a
/// missing floating profit defaults to zero (brokers omit it briefly
/// right after a fill).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionView {
    pub ticket: Ticket,
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Price,
    pub volume: Volume,
    pub profit: Decimal,
}

impl PositionView {
    /// Validate a raw snapshot. `None` means "skip this cycle".
    pub fn from_snapshot(snapshot: &PositionSnapshot) -> Option<Self> {
        Some(Self {
            ticket: snapshot.ticket?,
            symbol: snapshot.symbol.clone()?,
            side: snapshot.side?,
            entry_price: snapshot.entry_price?,
            volume: snapshot.volume?,
            profit: snapshot.profit.unwrap_or(Decimal::ZERO),
        })
    }

    /// Signed favorable excursion of `price` from entry, in price
    /// units: positive when the move favors the position.
    pub fn favorable_move(&self, price: Price) -> Decimal {
        match self.side {
            Side::Buy => price.inner() - self.entry_price.inner(),
            Side::Sell => self.entry_price.inner() - price.inner(),
        }
    }
}

/// Why an exit was requested. Serialized snake_case into logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Floating loss exceeded the money stop.
    MoneyStop,
    /// Adverse excursion exceeded the price stop.
    PriceStop,
    /// Adverse excursion exceeded the pip stop.
    PipStop,
    /// Never favorable within the early-abort window and down too far.
    EarlyAbort,
    /// Profit dropped hard during the break-even arming window.
    ProfitDrop,
    /// Profit dropped hard after break-even was armed.
    ProfitDropAfterBreakEven,
    /// Recovered to break-even after an unprofitable excursion.
    BreakEvenRecovered,
    /// First reversal against the move while in profit.
    FirstReversalInProfit,
    /// Giveback from the trailing anchor or best profit exceeded the
    /// allowed buffer.
    BufferBreach,
    /// A smaller trailing breach persisted past the tick countdown.
    BreachTimeout,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoneyStop => "money_stop",
            Self::PriceStop => "price_stop",
            Self::PipStop => "pip_stop",
            Self::EarlyAbort => "early_abort",
            Self::ProfitDrop => "profit_drop",
            Self::ProfitDropAfterBreakEven => "profit_drop_after_be",
            Self::BreakEvenRecovered => "be_recovered",
            Self::FirstReversalInProfit => "first_reversal_in_profit",
            Self::BufferBreach => "buffer_breach",
            Self::BreachTimeout => "breach_timeout",
        }
    }

    /// Protective reasons fire in any state and are never gated by
    /// higher-timeframe bias.
    pub fn is_protective(&self) -> bool {
        matches!(
            self,
            Self::MoneyStop
                | Self::PriceStop
                | Self::PipStop
                | Self::EarlyAbort
                | Self::ProfitDrop
                | Self::ProfitDropAfterBreakEven
                | Self::BreakEvenRecovered
        )
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A close request for one position. Immutable; consumed exactly once
/// by the trade executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitAction {
    pub ticket: Ticket,
    pub symbol: Symbol,
    /// The closing order side — opposite of the position side.
    pub side: Side,
    /// Volume to close; may be a partial-close fraction of the
    /// position volume.
    pub volume: Volume,
    pub reason: ExitReason,
}
