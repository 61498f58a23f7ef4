//! Orchestrator configuration.

use pipwatch_core::Symbol;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Symbols to watch and trade.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<Symbol>,

    /// Candle-loop sleep between passes that found no new closed bar.
    #[serde(default = "default_candle_poll_ms")]
    pub candle_poll_ms: u64,

    /// Candle-loop sleep after a pass that did work, so remaining
    /// symbols of the same bar are picked up promptly.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Quote poll interval for the tick feed.
    #[serde(default = "default_tick_poll_ms")]
    pub tick_poll_ms: u64,

    /// Bars fetched per timeframe on each candle pass.
    #[serde(default = "default_history_bars")]
    pub history_bars: usize,
}

fn default_symbols() -> Vec<Symbol> {
    vec![Symbol::from("EURUSD")]
}

fn default_candle_poll_ms() -> u64 {
    1000
}

fn default_settle_ms() -> u64 {
    100
}

fn default_tick_poll_ms() -> u64 {
    200
}

fn default_history_bars() -> usize {
    40
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            candle_poll_ms: default_candle_poll_ms(),
            settle_ms: default_settle_ms(),
            tick_poll_ms: default_tick_poll_ms(),
            history_bars: default_history_bars(),
        }
    }
}
