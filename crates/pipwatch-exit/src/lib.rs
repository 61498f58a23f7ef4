//! Position exit decision engine.
//!
//! Watches open positions and decides when to request a close, from
//! two event sources: price ticks (protective rules always, profit
//! rules optionally) and closed candles (profit rules against the
//! bar's close). Emits [`pipwatch_core::ExitAction`]s; never places
//! orders itself.
//!
//! Profit-taking exits can be gated by the last-known higher-timeframe
//! trend: while the longer timeframe still supports the position's
//! direction the exit is held back, letting winners run.

pub mod config;
pub mod engine;
pub mod loss;
pub mod profit;
pub mod state;

pub use config::ExitConfig;
pub use engine::ExitEngine;
pub use state::{htf_allows_profit_exit, is_favorable, BiasEntry, BiasStore, ExitState};
