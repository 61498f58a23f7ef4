//! Entry signal pipeline.
//!
//! Multi-timeframe gating: the bias timeframe (M15) sets direction,
//! the confirm timeframe (M5) must agree, the entry timeframe (M1)
//! triggers, and a pullback filter must have completed on the entry
//! timeframe. An optional n-tick confirmation stage then requires a
//! run of favorable ticks before a signal becomes executable.

pub mod classifier;
pub mod config;
pub mod mtf;
pub mod ntick;

pub use classifier::{SmaCrossClassifier, TrendClassifier};
pub use config::SignalConfig;
pub use mtf::MtfSignalGenerator;
pub use ntick::NTickConfirm;
