//! Core error types.

use thiserror::Error;

/// Errors from core type construction and conversion.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("unknown side: {0}")]
    UnknownSide(String),

    #[error("decimal error: {0}")]
    Decimal(#[from] rust_decimal::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
