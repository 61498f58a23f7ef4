//! In-memory broker for tests and paper trading.
//!
//! Quotes and candles are fed in by the harness; orders and positions
//! live in maps behind a single mutex. Fill simulation is minimal:
//! pending stops fill when a helper says so, market orders fill at
//! the stored quote.

use crate::{Gateway, GatewayError, GatewayResult, MarketOrderRequest, PendingStopRequest};
use parking_lot::Mutex;
use pipwatch_core::{
    Candle, PositionSnapshot, Price, Side, Symbol, SymbolInfo, Tick, Ticket, Timeframe, Volume,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct PendingOrder {
    request: PendingStopRequest,
}

#[derive(Debug, Default)]
struct SimState {
    next_ticket: u64,
    ticks: HashMap<Symbol, Tick>,
    candles: HashMap<(Symbol, Timeframe), Vec<Candle>>,
    infos: HashMap<Symbol, SymbolInfo>,
    atrs: HashMap<(Symbol, Timeframe), Decimal>,
    positions: HashMap<Ticket, PositionSnapshot>,
    pending: HashMap<Ticket, PendingOrder>,
    /// Submissions to let through before rejections start.
    fail_skip: u32,
    /// Number of upcoming order submissions to reject.
    fail_orders: u32,
    closed: Vec<(Ticket, Volume)>,
    market_orders: Vec<MarketOrderRequest>,
}

impl SimState {
    fn take_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket::new(self.next_ticket)
    }

    fn check_fail(&mut self) -> GatewayResult<()> {
        if self.fail_skip > 0 {
            self.fail_skip -= 1;
            return Ok(());
        }
        if self.fail_orders > 0 {
            self.fail_orders -= 1;
            return Err(GatewayError::OrderRejected("injected failure".into()));
        }
        Ok(())
    }
}

/// Simulated broker. Clone the `Arc` it lives in, not the broker.
#[derive(Debug, Default)]
pub struct SimBroker {
    state: Mutex<SimState>,
}

impl SimBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the current quote for a symbol.
    pub fn set_tick(&self, tick: Tick) {
        let mut state = self.state.lock();
        state.ticks.insert(tick.symbol.clone(), tick);
    }

    /// Append a candle to a symbol/timeframe history.
    pub fn push_candle(&self, candle: Candle) {
        let mut state = self.state.lock();
        state
            .candles
            .entry((candle.symbol.clone(), candle.timeframe))
            .or_default()
            .push(candle);
    }

    pub fn set_symbol_info(&self, symbol: Symbol, info: SymbolInfo) {
        self.state.lock().infos.insert(symbol, info);
    }

    /// Store an ATR reading for a symbol/timeframe, in price units.
    pub fn set_atr(&self, symbol: Symbol, timeframe: Timeframe, value: Decimal) {
        self.state.lock().atrs.insert((symbol, timeframe), value);
    }

    /// Open a position directly, bypassing order flow. Returns its
    /// ticket.
    pub fn open_position(
        &self,
        symbol: Symbol,
        side: Side,
        entry_price: Price,
        volume: Volume,
    ) -> Ticket {
        let mut state = self.state.lock();
        let ticket = state.take_ticket();
        state.positions.insert(
            ticket,
            PositionSnapshot::filled(ticket, symbol, side, entry_price, volume, Decimal::ZERO),
        );
        ticket
    }

    /// Overwrite the floating profit the broker reports for a ticket.
    pub fn set_profit(&self, ticket: Ticket, profit: Decimal) {
        let mut state = self.state.lock();
        if let Some(pos) = state.positions.get_mut(&ticket) {
            pos.profit = Some(profit);
        }
    }

    /// Convert a pending order into an open position, as a fill would.
    pub fn fill_pending(&self, ticket: Ticket) -> GatewayResult<Ticket> {
        let mut state = self.state.lock();
        let order = state
            .pending
            .remove(&ticket)
            .ok_or(GatewayError::TicketNotFound(ticket))?;
        let position_ticket = state.take_ticket();
        let req = order.request;
        state.positions.insert(
            position_ticket,
            PositionSnapshot::filled(
                position_ticket,
                req.symbol,
                req.side,
                req.price,
                req.volume,
                Decimal::ZERO,
            ),
        );
        Ok(position_ticket)
    }

    /// Reject the next `count` order submissions.
    pub fn fail_next_orders(&self, count: u32) {
        let mut state = self.state.lock();
        state.fail_skip = 0;
        state.fail_orders = count;
    }

    /// Let `skip` submissions through, then reject the next `count`.
    pub fn fail_orders_after(&self, skip: u32, count: u32) {
        let mut state = self.state.lock();
        state.fail_skip = skip;
        state.fail_orders = count;
    }

    /// Close requests observed so far, in submission order.
    pub fn closes(&self) -> Vec<(Ticket, Volume)> {
        self.state.lock().closed.clone()
    }

    /// Market order requests observed so far, in submission order.
    pub fn market_orders(&self) -> Vec<MarketOrderRequest> {
        self.state.lock().market_orders.clone()
    }

    pub fn pending_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<_> = self.state.lock().pending.keys().copied().collect();
        tickets.sort();
        tickets
    }

    /// Stored pending requests, ordered by ticket.
    pub fn pending_requests(&self) -> Vec<(Ticket, PendingStopRequest)> {
        let state = self.state.lock();
        let mut requests: Vec<_> = state
            .pending
            .iter()
            .map(|(t, o)| (*t, o.request.clone()))
            .collect();
        requests.sort_by_key(|(t, _)| *t);
        requests
    }
}

impl Gateway for SimBroker {
    fn positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
        let state = self.state.lock();
        let mut positions: Vec<_> = state.positions.values().cloned().collect();
        positions.sort_by_key(|p| p.ticket);
        Ok(positions)
    }

    fn tick(&self, symbol: &Symbol) -> GatewayResult<Tick> {
        self.state
            .lock()
            .ticks
            .get(symbol)
            .cloned()
            .ok_or_else(|| GatewayError::NoQuote(symbol.clone()))
    }

    fn candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        count: usize,
    ) -> GatewayResult<Vec<Candle>> {
        let state = self.state.lock();
        let history = state
            .candles
            .get(&(symbol.clone(), timeframe))
            .ok_or_else(|| GatewayError::SymbolNotFound(symbol.clone()))?;
        let start = history.len().saturating_sub(count);
        Ok(history[start..].to_vec())
    }

    fn symbol_info(&self, symbol: &Symbol) -> GatewayResult<SymbolInfo> {
        self.state
            .lock()
            .infos
            .get(symbol)
            .cloned()
            .ok_or_else(|| GatewayError::SymbolNotFound(symbol.clone()))
    }

    fn atr(&self, symbol: &Symbol, timeframe: Timeframe) -> GatewayResult<Option<Decimal>> {
        Ok(self.state.lock().atrs.get(&(symbol.clone(), timeframe)).copied())
    }

    fn place_pending_stop(&self, request: &PendingStopRequest) -> GatewayResult<Ticket> {
        let mut state = self.state.lock();
        state.check_fail()?;
        let ticket = state.take_ticket();
        state.pending.insert(
            ticket,
            PendingOrder {
                request: request.clone(),
            },
        );
        Ok(ticket)
    }

    fn place_market(&self, request: &MarketOrderRequest) -> GatewayResult<Ticket> {
        let mut state = self.state.lock();
        state.check_fail()?;
        let fill = state
            .ticks
            .get(&request.symbol)
            .map(|t| match request.side {
                Side::Buy => t.ask,
                Side::Sell => t.bid,
            })
            .ok_or_else(|| GatewayError::NoQuote(request.symbol.clone()))?;
        let ticket = state.take_ticket();
        state.positions.insert(
            ticket,
            PositionSnapshot::filled(
                ticket,
                request.symbol.clone(),
                request.side,
                fill,
                request.volume,
                Decimal::ZERO,
            ),
        );
        state.market_orders.push(request.clone());
        Ok(ticket)
    }

    fn cancel_order(&self, ticket: Ticket) -> GatewayResult<()> {
        let mut state = self.state.lock();
        state
            .pending
            .remove(&ticket)
            .map(|_| ())
            .ok_or(GatewayError::TicketNotFound(ticket))
    }

    fn pending_exists(&self, ticket: Ticket) -> GatewayResult<bool> {
        Ok(self.state.lock().pending.contains_key(&ticket))
    }

    fn close_position(&self, ticket: Ticket, volume: Volume) -> GatewayResult<()> {
        let mut state = self.state.lock();
        let position = state
            .positions
            .get(&ticket)
            .cloned()
            .ok_or(GatewayError::TicketNotFound(ticket))?;
        let full = position.volume.map(|v| volume >= v).unwrap_or(true);
        if full {
            state.positions.remove(&ticket);
        } else if let Some(pos) = state.positions.get_mut(&ticket) {
            if let Some(v) = pos.volume.as_mut() {
                *v = Volume::new(v.inner() - volume.inner());
            }
        }
        state.closed.push((ticket, volume));
        Ok(())
    }
}
