//! The per-position exit decision engine.
//!
//! Hybrid evaluation: protective rules run on every tick; profit
//! rules run on ticks and/or candle closes per config. All state is
//! in-memory and rebuilt from fresh broker snapshots each cycle, so a
//! failed close retries naturally on the next event.

use crate::{htf_allows_profit_exit, loss, profit, BiasStore, ExitConfig, ExitState};
use parking_lot::Mutex;
use pipwatch_core::{
    ExitAction, ExitReason, PositionView, Price, Symbol, Tick, Ticket, TrendLabel,
};
use pipwatch_gateway::Gateway;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct ExitEngine {
    config: ExitConfig,
    gateway: Arc<dyn Gateway>,
    states: Mutex<HashMap<Ticket, ExitState>>,
    bias: Mutex<BiasStore>,
    last_exit: Mutex<HashMap<Ticket, Instant>>,
    pip_sizes: Mutex<HashMap<Symbol, Decimal>>,
}

impl ExitEngine {
    pub fn new(config: ExitConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            gateway,
            states: Mutex::new(HashMap::new()),
            bias: Mutex::new(BiasStore::new()),
            last_exit: Mutex::new(HashMap::new()),
            pip_sizes: Mutex::new(HashMap::new()),
        }
    }

    /// Record the latest higher-timeframe reads for a symbol. Called
    /// by the orchestrator after each signal-generation pass.
    pub fn update_bias(
        &self,
        symbol: &Symbol,
        m5: Option<TrendLabel>,
        m15: Option<TrendLabel>,
    ) {
        self.bias.lock().update(symbol, m5, m15);
    }

    /// Evaluate every open position once against this tick. Positions
    /// on other symbols are priced from a fresh quote.
    pub fn on_tick(&self, tick: &Tick) -> Vec<ExitAction> {
        let snapshots = match self.gateway.positions() {
            Ok(p) => p,
            Err(err) => {
                debug!(error = %err, "position fetch failed, skipping cycle");
                return Vec::new();
            }
        };
        if snapshots.is_empty() {
            self.states.lock().clear();
            self.last_exit.lock().clear();
            return Vec::new();
        }

        let mut actions = Vec::new();
        let mut open_tickets = HashSet::new();
        for snapshot in &snapshots {
            let view = match PositionView::from_snapshot(snapshot) {
                Some(v) => v,
                None => continue,
            };
            open_tickets.insert(view.ticket);

            let price = match self.close_side_price(&view, tick) {
                Some(p) => p,
                None => continue,
            };
            let pip_size = match self.pip_size(&view.symbol) {
                Some(p) => p,
                None => continue,
            };
            let profit_allowed = self.htf_allows(&view.symbol, view.side);
            let buffer = self.buffer_pips(&view.symbol, pip_size);

            let mut states = self.states.lock();
            let state = states
                .entry(view.ticket)
                .or_insert_with(|| ExitState::new(price));

            if let Some(reason) = loss::evaluate(&self.config, &view, price, pip_size, state) {
                state.advance_tick(price);
                drop(states);
                self.emit(&view, reason, price, &mut actions);
                continue;
            }

            if self.config.profit_exits_on_tick && state.be_armed {
                if let Some(reason) =
                    profit::evaluate_tick(&self.config, &view, price, pip_size, buffer, state)
                {
                    state.advance_tick(price);
                    drop(states);
                    if profit_allowed {
                        self.emit(&view, reason, price, &mut actions);
                    } else {
                        debug!(
                            ticket = %view.ticket,
                            reason = %reason,
                            "profit exit suppressed by htf bias"
                        );
                    }
                    continue;
                }
            }
            state.advance_tick(price);
        }

        self.prune(&open_tickets);
        actions
    }

    /// Evaluate candle-close profit rules for open positions on
    /// `symbol`, against the closed bar's price.
    pub fn on_candle_close(&self, symbol: &Symbol, close: Price) -> Vec<ExitAction> {
        if !self.config.profit_exits_on_candle_close {
            return Vec::new();
        }
        let snapshots = match self.gateway.positions() {
            Ok(p) => p,
            Err(err) => {
                debug!(error = %err, "position fetch failed, skipping candle close");
                return Vec::new();
            }
        };
        if snapshots.is_empty() {
            self.states.lock().clear();
            return Vec::new();
        }

        let mut actions = Vec::new();
        for snapshot in &snapshots {
            let view = match PositionView::from_snapshot(snapshot) {
                Some(v) => v,
                None => continue,
            };
            if view.symbol != *symbol {
                continue;
            }
            let pip_size = match self.pip_size(&view.symbol) {
                Some(p) => p,
                None => continue,
            };
            let profit_allowed = self.htf_allows(&view.symbol, view.side);
            let buffer = self.buffer_pips(&view.symbol, pip_size);

            let mut states = self.states.lock();
            let state = states
                .entry(view.ticket)
                .or_insert_with(|| ExitState::new(close));

            if !state.be_armed {
                state.advance_close(close);
                continue;
            }
            let fired = profit::evaluate_close(&self.config, &view, close, pip_size, buffer, state);
            state.advance_close(close);
            drop(states);

            if let Some(reason) = fired {
                if profit_allowed {
                    self.emit(&view, reason, close, &mut actions);
                } else {
                    debug!(
                        ticket = %view.ticket,
                        reason = %reason,
                        "candle-close exit suppressed by htf bias"
                    );
                }
            }
        }
        actions
    }

    fn emit(
        &self,
        view: &PositionView,
        reason: ExitReason,
        price: Price,
        actions: &mut Vec<ExitAction>,
    ) {
        if !self.cooldown_elapsed(view.ticket) {
            debug!(ticket = %view.ticket, reason = %reason, "exit suppressed by cooldown");
            return;
        }
        info!(
            ticket = %view.ticket,
            symbol = %view.symbol,
            side = %view.side,
            price = %price,
            reason = %reason,
            "exit requested"
        );
        actions.push(ExitAction {
            ticket: view.ticket,
            symbol: view.symbol.clone(),
            side: view.side.closing(),
            volume: view.volume.scaled(self.config.partial_close_ratio),
            reason,
        });
    }

    /// Check-and-stamp the per-ticket cooldown. The stamp is only
    /// taken when an action is actually emitted.
    fn cooldown_elapsed(&self, ticket: Ticket) -> bool {
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        let mut last = self.last_exit.lock();
        let now = Instant::now();
        if let Some(at) = last.get(&ticket) {
            if now.duration_since(*at) < cooldown {
                return false;
            }
        }
        last.insert(ticket, now);
        true
    }

    fn htf_allows(&self, symbol: &Symbol, side: pipwatch_core::Side) -> bool {
        htf_allows_profit_exit(
            &self.bias.lock(),
            symbol,
            side,
            self.config.htf_filter_enabled,
            Duration::from_secs(self.config.htf_stale_secs),
            self.config.htf_use_m15,
            self.config.htf_use_m5,
        )
    }

    /// Close-side price for a position: the passed tick when symbols
    /// match, otherwise a fresh quote from the gateway.
    fn close_side_price(&self, view: &PositionView, tick: &Tick) -> Option<Price> {
        if view.symbol == tick.symbol {
            return Some(tick.close_price(view.side));
        }
        match self.gateway.tick(&view.symbol) {
            Ok(t) => Some(t.close_price(view.side)),
            Err(err) => {
                debug!(symbol = %view.symbol, error = %err, "no quote for position symbol");
                None
            }
        }
    }

    /// Trailing buffer in pips: scaled from the gateway's ATR when
    /// one is available for the configured timeframe, the fixed
    /// `buffer_pips` otherwise.
    fn buffer_pips(&self, symbol: &Symbol, pip_size: Decimal) -> Decimal {
        match self.gateway.atr(symbol, self.config.atr_timeframe) {
            Ok(Some(atr)) if atr > Decimal::ZERO => {
                atr / pip_size * self.config.atr_buffer_factor
            }
            Ok(_) => self.config.buffer_pips,
            Err(err) => {
                debug!(symbol = %symbol, error = %err, "atr fetch failed, using fixed buffer");
                self.config.buffer_pips
            }
        }
    }

    fn pip_size(&self, symbol: &Symbol) -> Option<Decimal> {
        if let Some(pip) = self.pip_sizes.lock().get(symbol) {
            return Some(*pip);
        }
        match self.gateway.symbol_info(symbol) {
            Ok(info) => {
                let pip = info.pip_size();
                if pip.is_zero() {
                    debug!(symbol = %symbol, "zero pip size, skipping symbol");
                    return None;
                }
                self.pip_sizes.lock().insert(symbol.clone(), pip);
                Some(pip)
            }
            Err(err) => {
                debug!(symbol = %symbol, error = %err, "symbol info fetch failed");
                None
            }
        }
    }

    /// Drop state for tickets no longer reported open, whatever
    /// closed them.
    fn prune(&self, open_tickets: &HashSet<Ticket>) {
        self.states.lock().retain(|t, _| open_tickets.contains(t));
        self.last_exit
            .lock()
            .retain(|t, _| open_tickets.contains(t));
    }
}
