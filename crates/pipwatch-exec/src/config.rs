//! Executor configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Stop-loss distance (pips) for entries without an explicit SL.
    #[serde(default = "default_sl_pips")]
    pub default_sl_pips: Decimal,

    /// Take-profit distance (pips) for entries without an explicit
    /// TP.
    #[serde(default = "default_tp_pips")]
    pub default_tp_pips: Decimal,

    /// Lot used when the signal carries none.
    #[serde(default = "default_lot")]
    pub default_lot: Decimal,

    /// Per-ticket window inside which repeated close submissions for
    /// the same ticket are dropped.
    #[serde(default = "default_debounce_ms")]
    pub exit_debounce_ms: u64,
}

fn default_sl_pips() -> Decimal {
    Decimal::new(5, 0)
}

fn default_tp_pips() -> Decimal {
    Decimal::new(50, 0)
}

fn default_lot() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_debounce_ms() -> u64 {
    2000
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            default_sl_pips: default_sl_pips(),
            default_tp_pips: default_tp_pips(),
            default_lot: default_lot(),
            exit_debounce_ms: default_debounce_ms(),
        }
    }
}
