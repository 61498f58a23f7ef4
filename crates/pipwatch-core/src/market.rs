//! Instrument identification and pip arithmetic.
//!
//! FX symbols quote with differing precision; the pip convention is
//! 10x the minimum increment (point) for 3/5-digit symbols and the
//! point itself otherwise. All pip/price conversions in the system go
//! through [`SymbolInfo`].

use crate::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument identifier (e.g. "EURUSD", "USDJPY").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Chart timeframe.
///
/// M1 is the entry cadence; M5/M15 are the confirm/bias timeframes of
/// the multi-timeframe signal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
}

impl Timeframe {
    /// Bar duration in seconds.
    pub fn secs(&self) -> u64 {
        match self {
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::H1 => 3600,
        }
    }

    /// Seconds remaining until the next bar-close boundary for this
    /// timeframe, given the current epoch second.
    pub fn secs_to_next_close(&self, epoch_secs: u64) -> u64 {
        let period = self.secs();
        let into_bar = epoch_secs % period;
        period - into_bar
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::M1 => write!(f, "M1"),
            Self::M5 => write!(f, "M5"),
            Self::M15 => write!(f, "M15"),
            Self::H1 => write!(f, "H1"),
        }
    }
}

/// Per-instrument quoting metadata from the broker.
///
/// `point` is the minimum price increment; `digits` the quote
/// precision. Stop/freeze levels are expressed in points, as brokers
/// report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Minimum price increment.
    pub point: Decimal,
    /// Quote precision (decimal places).
    pub digits: u32,
    /// Minimum pending-stop distance, in points.
    pub stops_level: u32,
    /// Freeze distance, in points.
    pub freeze_level: u32,
}

impl SymbolInfo {
    pub fn new(point: Decimal, digits: u32) -> Self {
        Self {
            point,
            digits,
            stops_level: 0,
            freeze_level: 0,
        }
    }

    /// One pip in price units: 10x point for 3/5-digit symbols, else
    /// the point itself.
    pub fn pip_size(&self) -> Decimal {
        if self.digits == 3 || self.digits == 5 {
            self.point * Decimal::from(10)
        } else {
            self.point
        }
    }

    /// Convert a pip distance to a price distance.
    pub fn pips_to_price(&self, pips: Decimal) -> Decimal {
        self.pip_size() * pips
    }

    /// Convert a price distance back to pips.
    ///
    /// Returns `None` when the pip size is zero.
    pub fn price_to_pips(&self, distance: Decimal) -> Option<Decimal> {
        let pip = self.pip_size();
        if pip.is_zero() {
            return None;
        }
        Some(distance / pip)
    }

    /// Minimum stop distance in price units.
    ///
    /// Brokers reject pending stops closer than
    /// `max(stops_level, freeze_level) * point`.
    pub fn min_stop_distance(&self) -> Decimal {
        let level = self.stops_level.max(self.freeze_level);
        self.point * Decimal::from(level)
    }

    /// Round a price to this instrument's quote precision.
    pub fn normalize(&self, price: Price) -> Price {
        price.round_to_digits(self.digits)
    }
}
