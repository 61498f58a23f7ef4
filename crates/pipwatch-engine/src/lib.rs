//! Event orchestration for the trading pipeline.
//!
//! Ties the gateway, signal pipeline, exit engine, executor and
//! straddle manager together under one lifecycle: a candle loop that
//! fires once per new closed entry-timeframe bar, and a tick path
//! driving protective exits and n-tick entry confirmation.

pub mod config;
pub mod orchestrator;

pub use config::EngineConfig;
pub use orchestrator::Orchestrator;
