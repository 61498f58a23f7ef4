//! The broker gateway trait and order request types.

use crate::GatewayResult;
use pipwatch_core::{
    Candle, PositionSnapshot, Price, Side, Symbol, SymbolInfo, Tick, Ticket, Timeframe, Volume,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request to place a pending stop order (buy-stop above / sell-stop
/// below the market).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingStopRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub volume: Volume,
    /// Trigger price. Must respect the instrument's minimum stop
    /// distance; the caller bumps it before submission.
    pub price: Price,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    /// Free-form tag carried on the order (group membership etc).
    pub comment: String,
}

/// Request to open a position at market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub volume: Volume,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub comment: String,
}

/// Synchronous broker interface.
///
/// Implementations must be cheap to call from the hot path (the exit
/// engine polls positions and quotes every cycle) and safe to share
/// across tasks behind an `Arc`.
pub trait Gateway: Send + Sync {
    /// All currently open positions, raw as the broker reports them.
    fn positions(&self) -> GatewayResult<Vec<PositionSnapshot>>;

    /// Latest quote for a symbol.
    fn tick(&self, symbol: &Symbol) -> GatewayResult<Tick>;

    /// Most recent `count` candles for a symbol/timeframe, oldest
    /// first. The last element may be the still-forming bar.
    fn candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        count: usize,
    ) -> GatewayResult<Vec<Candle>>;

    /// Quoting metadata for a symbol.
    fn symbol_info(&self, symbol: &Symbol) -> GatewayResult<SymbolInfo>;

    /// Current average true range for a symbol/timeframe, in price
    /// units, when the data source computes one. `Ok(None)` means the
    /// indicator is unavailable and callers fall back to fixed
    /// distances.
    fn atr(&self, symbol: &Symbol, timeframe: Timeframe) -> GatewayResult<Option<Decimal>>;

    /// Place a pending stop order. Returns the order ticket.
    fn place_pending_stop(&self, request: &PendingStopRequest) -> GatewayResult<Ticket>;

    /// Open a position at market. Returns the position ticket.
    fn place_market(&self, request: &MarketOrderRequest) -> GatewayResult<Ticket>;

    /// Cancel a pending order.
    fn cancel_order(&self, ticket: Ticket) -> GatewayResult<()>;

    /// Whether a pending order with this ticket still exists. A filled
    /// or cancelled order no longer does.
    fn pending_exists(&self, ticket: Ticket) -> GatewayResult<bool>;

    /// Close (part of) an open position at market.
    fn close_position(&self, ticket: Ticket, volume: Volume) -> GatewayResult<()>;
}
