//! Signal pipeline configuration.

use pipwatch_core::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Directional bias timeframe.
    #[serde(default = "default_tf_bias")]
    pub tf_bias: Timeframe,

    /// Confirmation timeframe.
    #[serde(default = "default_tf_confirm")]
    pub tf_confirm: Timeframe,

    /// Entry trigger timeframe.
    #[serde(default = "default_tf_entry")]
    pub tf_entry: Timeframe,

    /// SMA period of the pullback filter.
    #[serde(default = "default_pullback_period")]
    pub pullback_period: usize,

    /// Bars before the SMA window inspected for the "was below" leg
    /// of the pullback condition.
    #[serde(default = "default_pullback_lookback")]
    pub pullback_lookback: usize,

    /// Consecutive favorable ticks required by the n-tick stage.
    /// Zero disables n-tick confirmation.
    #[serde(default = "default_n_ticks")]
    pub n_ticks: u32,

    /// Minimum favorable movement per tick (price units).
    #[serde(default)]
    pub min_tick_move: Decimal,

    /// Reject confirmation ticks when the spread (points) exceeds
    /// this. `None` disables the filter.
    #[serde(default)]
    pub max_spread_points: Option<Decimal>,
}

fn default_tf_bias() -> Timeframe {
    Timeframe::M15
}

fn default_tf_confirm() -> Timeframe {
    Timeframe::M5
}

fn default_tf_entry() -> Timeframe {
    Timeframe::M1
}

fn default_pullback_period() -> usize {
    20
}

fn default_pullback_lookback() -> usize {
    5
}

fn default_n_ticks() -> u32 {
    3
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            tf_bias: default_tf_bias(),
            tf_confirm: default_tf_confirm(),
            tf_entry: default_tf_entry(),
            pullback_period: default_pullback_period(),
            pullback_lookback: default_pullback_lookback(),
            n_ticks: default_n_ticks(),
            min_tick_move: Decimal::ZERO,
            max_spread_points: None,
        }
    }
}
