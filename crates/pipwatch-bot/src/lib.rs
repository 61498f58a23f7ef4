//! Multi-timeframe FX bot binary.
//!
//! Wires the gateway, signal pipeline, exit engine, executor and
//! straddle manager under the orchestrator's lifecycle.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
