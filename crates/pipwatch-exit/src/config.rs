//! Exit engine configuration.
//!
//! Every tunable is enumerated here once and the config is passed
//! immutably at construction. Protective rules (stops, early abort,
//! profit-drop) always run; profit-taking rules are switched per
//! event source by the hybrid flags.

use pipwatch_core::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    // ---- Protective stops ----
    /// Close when floating loss reaches this amount (account
    /// currency). Zero disables.
    #[serde(default = "default_max_loss_money")]
    pub max_loss_money: Decimal,

    /// Ticks to wait before the money stop may trip, so spread right
    /// after entry cannot fire it.
    #[serde(default = "default_money_grace_ticks")]
    pub money_grace_ticks: u32,

    /// Close on adverse excursion beyond this price distance. Zero
    /// disables; takes precedence over the pip variant.
    #[serde(default)]
    pub max_loss_price: Decimal,

    /// Close on adverse excursion beyond this many pips. Zero
    /// disables.
    #[serde(default)]
    pub max_loss_pips: Decimal,

    // ---- Early abort ----
    #[serde(default = "default_true")]
    pub early_abort_enabled: bool,

    /// Ticks after which a position that never moved favorably is a
    /// candidate for abort.
    #[serde(default = "default_early_abort_ticks")]
    pub early_abort_ticks: u32,

    /// Adverse excursion (pips) required for the abort to fire.
    #[serde(default = "default_early_abort_loss_pips")]
    pub early_abort_loss_pips: Decimal,

    /// A favorable move of at least this many pips counts as "ever
    /// favorable" and exempts the position from early abort.
    #[serde(default = "default_min_favorable_pips")]
    pub min_favorable_pips: Decimal,

    // ---- Break-even arming and money drops ----
    /// Ticks a position must be observed before break-even may arm;
    /// the first non-negative profit after the window arms it.
    #[serde(default = "default_be_arming_ticks")]
    pub be_arming_ticks: u32,

    /// During the arming window, close when floating loss reaches
    /// this amount.
    #[serde(default = "default_profit_drop_money")]
    pub profit_drop_money: Decimal,

    /// After break-even armed, close when floating loss reaches this
    /// amount.
    #[serde(default = "default_profit_drop_money")]
    pub profit_drop_after_be_money: Decimal,

    /// After an unprofitable excursion post-arming, take the exit as
    /// soon as profit recovers into (0, band).
    #[serde(default = "default_be_recover_band")]
    pub be_recover_band: Decimal,

    // ---- Profit-taking ----
    #[serde(default = "default_true")]
    pub exit_on_first_reversal_in_profit: bool,

    /// Whether an unchanged price counts as a reversal.
    #[serde(default)]
    pub treat_flat_as_reversal: bool,

    /// Profit-taking rules only fire beyond this many pips of gain.
    #[serde(default = "default_min_profit_pips")]
    pub min_profit_pips: Decimal,

    /// Trailing buffer distance (pips) from the anchor, used when the
    /// gateway supplies no ATR.
    #[serde(default = "default_buffer_pips")]
    pub buffer_pips: Decimal,

    /// Timeframe whose ATR sizes the trailing buffer when the gateway
    /// supplies one.
    #[serde(default = "default_atr_timeframe")]
    pub atr_timeframe: Timeframe,

    /// Buffer = ATR (in pips) x this factor when an ATR is available.
    #[serde(default = "default_atr_buffer_factor")]
    pub atr_buffer_factor: Decimal,

    /// Armed ticks before anchor trailing activates.
    #[serde(default = "default_buffer_start_tick")]
    pub buffer_start_tick: u32,

    /// Closed candles before candle-side trailing activates.
    #[serde(default = "default_buffer_start_candle")]
    pub buffer_start_candle: u32,

    /// Epsilon (pips) against flip-flopping on equal prices.
    #[serde(default)]
    pub eps_pips: Decimal,

    /// Best-profit giveback (account currency) that closes
    /// immediately.
    #[serde(default = "default_breach_threshold_money")]
    pub breach_threshold_money: Decimal,

    /// Ticks a smaller giveback may persist before closing.
    #[serde(default = "default_breach_tick_limit")]
    pub breach_tick_limit: u32,

    // ---- Hybrid mode ----
    #[serde(default = "default_true")]
    pub profit_exits_on_tick: bool,

    #[serde(default = "default_true")]
    pub profit_exits_on_candle_close: bool,

    // ---- Higher-timeframe gating ----
    #[serde(default = "default_true")]
    pub htf_filter_enabled: bool,

    /// Bias older than this is treated as permissive.
    #[serde(default = "default_htf_stale_secs")]
    pub htf_stale_secs: u64,

    #[serde(default = "default_true")]
    pub htf_use_m15: bool,

    #[serde(default = "default_true")]
    pub htf_use_m5: bool,

    // ---- Plumbing ----
    /// Per-ticket suppression window between close requests.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Fraction of position volume to close (1 = full close).
    #[serde(default = "default_partial_close_ratio")]
    pub partial_close_ratio: Decimal,
}

fn default_max_loss_money() -> Decimal {
    Decimal::new(10, 0)
}

fn default_money_grace_ticks() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_early_abort_ticks() -> u32 {
    5
}

fn default_early_abort_loss_pips() -> Decimal {
    Decimal::new(2, 0)
}

fn default_min_favorable_pips() -> Decimal {
    Decimal::new(1, 0)
}

fn default_be_arming_ticks() -> u32 {
    20
}

fn default_profit_drop_money() -> Decimal {
    Decimal::new(5, 0)
}

fn default_be_recover_band() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_min_profit_pips() -> Decimal {
    Decimal::new(2, 0)
}

fn default_buffer_pips() -> Decimal {
    Decimal::new(2, 0)
}

fn default_atr_timeframe() -> Timeframe {
    Timeframe::M1
}

fn default_atr_buffer_factor() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_buffer_start_tick() -> u32 {
    3
}

fn default_buffer_start_candle() -> u32 {
    2
}

fn default_breach_threshold_money() -> Decimal {
    Decimal::new(4, 2) // 0.04
}

fn default_breach_tick_limit() -> u32 {
    5
}

fn default_htf_stale_secs() -> u64 {
    180
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_partial_close_ratio() -> Decimal {
    Decimal::ONE
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            max_loss_money: default_max_loss_money(),
            money_grace_ticks: default_money_grace_ticks(),
            max_loss_price: Decimal::ZERO,
            max_loss_pips: Decimal::ZERO,
            early_abort_enabled: true,
            early_abort_ticks: default_early_abort_ticks(),
            early_abort_loss_pips: default_early_abort_loss_pips(),
            min_favorable_pips: default_min_favorable_pips(),
            be_arming_ticks: default_be_arming_ticks(),
            profit_drop_money: default_profit_drop_money(),
            profit_drop_after_be_money: default_profit_drop_money(),
            be_recover_band: default_be_recover_band(),
            exit_on_first_reversal_in_profit: true,
            treat_flat_as_reversal: false,
            min_profit_pips: default_min_profit_pips(),
            buffer_pips: default_buffer_pips(),
            atr_timeframe: default_atr_timeframe(),
            atr_buffer_factor: default_atr_buffer_factor(),
            buffer_start_tick: default_buffer_start_tick(),
            buffer_start_candle: default_buffer_start_candle(),
            eps_pips: Decimal::ZERO,
            breach_threshold_money: default_breach_threshold_money(),
            breach_tick_limit: default_breach_tick_limit(),
            profit_exits_on_tick: true,
            profit_exits_on_candle_close: true,
            htf_filter_enabled: true,
            htf_stale_secs: default_htf_stale_secs(),
            htf_use_m15: true,
            htf_use_m5: true,
            cooldown_ms: default_cooldown_ms(),
            partial_close_ratio: default_partial_close_ratio(),
        }
    }
}
