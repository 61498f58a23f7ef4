//! Order execution against the gateway.
//!
//! Consumes [`pipwatch_core::ExitAction`]s and confirmed entry
//! signals. Failures are logged, never raised: an exit that fails
//! leaves the position open, so the exit engine re-emits on the next
//! evaluation cycle.

pub mod config;
pub mod executor;

pub use config::ExecConfig;
pub use executor::TradeExecutor;
