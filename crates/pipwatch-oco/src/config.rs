//! Straddle manager configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcoConfig {
    /// Distance of each leg from the touch price, in pips. Bumped to
    /// the broker's minimum stop distance when that is larger.
    #[serde(default = "default_offset_pips")]
    pub offset_pips: Decimal,

    /// Seconds after placement when unfilled legs are cancelled.
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

fn default_offset_pips() -> Decimal {
    Decimal::new(2, 0)
}

fn default_expiry_secs() -> u64 {
    120
}

impl Default for OcoConfig {
    fn default() -> Self {
        Self {
            offset_pips: default_offset_pips(),
            expiry_secs: default_expiry_secs(),
        }
    }
}
