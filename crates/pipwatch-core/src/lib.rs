//! Core domain types for the pipwatch trading system.
//!
//! This crate provides the fundamental types used throughout the bot:
//! - `Price`, `Volume`: precision-safe numeric types
//! - `Symbol`, `Timeframe`, `SymbolInfo`: instrument identification and pip math
//! - `Tick`, `Candle`: market data snapshots
//! - `PositionSnapshot`, `PositionView`: broker position records and their
//!   validated view
//! - `ExitAction`, `ExitReason`: close requests emitted by the exit engine
//! - `TradeSignal`, `TrendLabel`: entry signals flowing through the pipeline

pub mod decimal;
pub mod error;
pub mod market;
pub mod position;
pub mod signal;
pub mod types;

pub use decimal::{Price, Volume};
pub use error::{CoreError, Result};
pub use market::{Symbol, SymbolInfo, Timeframe};
pub use position::{ExitAction, ExitReason, PositionSnapshot, PositionView, Side, Ticket};
pub use signal::{TradeSignal, TrendLabel};
pub use types::{Candle, Tick};
