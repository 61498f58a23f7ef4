//! Straddle (one-cancels-other) order management.
//!
//! Places a buy-stop/sell-stop pair bracketing the current price and
//! guarantees at most one leg survives. Fills are detected by
//! observing that a leg is no longer reported as pending, not by fill
//! events: the tick sweep reconciles every active group against the
//! broker's pending-order list. Expiry is enforced by active
//! cancellation from the sweep rather than broker-side order expiry.

pub mod config;
pub mod manager;

pub use config::OcoConfig;
pub use manager::{StraddleGroup, StraddleManager};
