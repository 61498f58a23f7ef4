//! Gateway error types.

use pipwatch_core::{Symbol, Ticket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not connected to broker")]
    NotConnected,

    #[error("no quote for symbol: {0}")]
    NoQuote(Symbol),

    #[error("symbol not found: {0}")]
    SymbolNotFound(Symbol),

    #[error("insufficient candle history for {symbol} ({have}/{want})")]
    InsufficientHistory {
        symbol: Symbol,
        have: usize,
        want: usize,
    },

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("ticket not found: {0}")]
    TicketNotFound(Ticket),

    #[error("broker request failed: {0}")]
    RequestFailed(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
