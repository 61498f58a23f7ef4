//! Broker gateway abstraction.
//!
//! [`Gateway`] is the single seam between trading logic and the
//! terminal/broker: quotes, candle history, open positions, pending
//! orders and close requests all go through it. Production wires a
//! real terminal bridge; tests and paper trading use [`SimBroker`].

pub mod error;
pub mod feed;
pub mod gateway;
pub mod sim;

pub use error::{GatewayError, GatewayResult};
pub use feed::TickFeed;
pub use gateway::{Gateway, MarketOrderRequest, PendingStopRequest};
pub use sim::SimBroker;
