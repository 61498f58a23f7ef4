//! Entry signals produced by the multi-timeframe pipeline.

use crate::{Price, Side, Symbol, Volume};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional read of one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Buy,
    Sell,
    Hold,
}

impl TrendLabel {
    /// True when this label points the same way as the position side.
    pub fn supports(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Buy, Side::Buy) | (Self::Sell, Side::Sell)
        )
    }

    /// True when this label points against the position side. `Hold`
    /// neither supports nor opposes.
    pub fn opposes(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Buy, Side::Sell) | (Self::Sell, Side::Buy)
        )
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Buy => Some(Side::Buy),
            Self::Sell => Some(Side::Sell),
            Self::Hold => None,
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// One evaluated entry signal, carrying the per-timeframe reads that
/// produced it. `final_signal` is `Hold` unless bias, confirm and
/// entry all line up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: Symbol,
    pub final_signal: TrendLabel,
    /// M15 bias read, kept for exit gating.
    pub m15_bias: TrendLabel,
    /// M5 confirmation read.
    pub m5_confirm: TrendLabel,
    /// M1 entry read.
    pub m1_entry: TrendLabel,
    /// Whether the pullback filter passed on the entry timeframe.
    pub pullback_completed: bool,
    /// Reference entry price at evaluation time.
    pub entry_price: Option<Price>,
    /// Suggested lot, if the sizing stage ran.
    pub lot: Option<Volume>,
}

impl TradeSignal {
    /// A no-trade signal for `symbol` with all reads at `Hold`.
    pub fn hold(symbol: Symbol) -> Self {
        Self {
            symbol,
            final_signal: TrendLabel::Hold,
            m15_bias: TrendLabel::Hold,
            m5_confirm: TrendLabel::Hold,
            m1_entry: TrendLabel::Hold,
            pullback_completed: false,
            entry_price: None,
            lot: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.final_signal != TrendLabel::Hold
    }
}
