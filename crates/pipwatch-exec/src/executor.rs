//! Exit and entry execution.

use crate::ExecConfig;
use parking_lot::Mutex;
use pipwatch_core::{ExitAction, PositionSnapshot, Price, Side, Ticket, TradeSignal, Volume};
use pipwatch_gateway::{Gateway, MarketOrderRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct TradeExecutor {
    config: ExecConfig,
    gateway: Arc<dyn Gateway>,
    last_exit_attempt: Mutex<HashMap<Ticket, Instant>>,
}

impl TradeExecutor {
    pub fn new(config: ExecConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            gateway,
            last_exit_attempt: Mutex::new(HashMap::new()),
        }
    }

    /// Close a position per the exit action. Returns whether a close
    /// was actually submitted; a debounced or stale action is dropped
    /// quietly because the engine will re-emit while the position
    /// stays open.
    pub fn execute_exit(&self, action: &ExitAction) -> bool {
        if !action.volume.is_positive() {
            debug!(ticket = %action.ticket, "exit dropped, non-positive volume");
            return false;
        }
        if !self.debounce_elapsed(action.ticket) {
            debug!(ticket = %action.ticket, "exit debounced");
            return false;
        }

        // The position may already be gone (closed externally or by a
        // prior action that raced this one).
        match self.gateway.positions() {
            Ok(positions) => {
                self.prune_attempts(&positions);
                let still_open = positions
                    .iter()
                    .any(|p| p.ticket == Some(action.ticket));
                if !still_open {
                    debug!(ticket = %action.ticket, "exit dropped, position already closed");
                    return false;
                }
            }
            Err(err) => {
                warn!(ticket = %action.ticket, error = %err, "position check failed, skipping exit");
                return false;
            }
        }

        match self.gateway.close_position(action.ticket, action.volume) {
            Ok(()) => {
                info!(
                    ticket = %action.ticket,
                    symbol = %action.symbol,
                    volume = %action.volume,
                    reason = %action.reason,
                    "position closed"
                );
                true
            }
            Err(err) => {
                warn!(
                    ticket = %action.ticket,
                    symbol = %action.symbol,
                    error = %err,
                    "close failed, will retry on next evaluation"
                );
                false
            }
        }
    }

    /// Open positions for every actionable signal. Returns the number
    /// of entries submitted; individual failures are logged and do
    /// not stop the batch.
    pub fn process_signals(&self, signals: &[TradeSignal]) -> usize {
        let mut executed = 0;
        for signal in signals {
            if !signal.is_actionable() {
                continue;
            }
            let side = match signal.final_signal.side() {
                Some(s) => s,
                None => continue,
            };
            if self.submit_entry(signal, side) {
                executed += 1;
            }
        }
        if executed == 0 {
            debug!("no actionable signals, no trades executed");
        }
        executed
    }

    fn submit_entry(&self, signal: &TradeSignal, side: Side) -> bool {
        let reference = match signal.entry_price {
            Some(p) => Some(p),
            None => match self.gateway.tick(&signal.symbol) {
                Ok(t) => Some(match side {
                    Side::Buy => t.ask,
                    Side::Sell => t.bid,
                }),
                Err(err) => {
                    warn!(symbol = %signal.symbol, error = %err, "entry skipped, no price");
                    None
                }
            },
        };
        let reference = match reference {
            Some(p) => p,
            None => return false,
        };

        let (stop_loss, take_profit) = self.protective_prices(signal, side, reference);
        let lot = Volume::new(signal.lot.map(|l| l.inner()).unwrap_or(self.config.default_lot));

        let request = MarketOrderRequest {
            symbol: signal.symbol.clone(),
            side,
            volume: lot,
            stop_loss,
            take_profit,
            comment: "mtf_entry".into(),
        };
        match self.gateway.place_market(&request) {
            Ok(ticket) => {
                info!(
                    ticket = %ticket,
                    symbol = %signal.symbol,
                    side = %side,
                    lot = %lot,
                    "entry placed"
                );
                true
            }
            Err(err) => {
                warn!(symbol = %signal.symbol, side = %side, error = %err, "entry rejected");
                false
            }
        }
    }

    /// Default-distance SL/TP around the reference price, normalized
    /// to the instrument. `None` when symbol metadata is unavailable;
    /// the order then goes in unprotected, as the reference system
    /// does.
    fn protective_prices(
        &self,
        signal: &TradeSignal,
        side: Side,
        reference: Price,
    ) -> (Option<Price>, Option<Price>) {
        let info = match self.gateway.symbol_info(&signal.symbol) {
            Ok(i) => i,
            Err(err) => {
                debug!(symbol = %signal.symbol, error = %err, "no symbol info, entry without sl/tp");
                return (None, None);
            }
        };
        let sl_distance = info.pips_to_price(self.config.default_sl_pips);
        let tp_distance = info.pips_to_price(self.config.default_tp_pips);
        let (sl, tp) = match side {
            Side::Buy => (reference - sl_distance, reference + tp_distance),
            Side::Sell => (reference + sl_distance, reference - tp_distance),
        };
        (Some(info.normalize(sl)), Some(info.normalize(tp)))
    }

    /// Drop debounce stamps for tickets no longer reported open; the
    /// map otherwise grows by one entry per ever-closed ticket.
    fn prune_attempts(&self, open: &[PositionSnapshot]) {
        self.last_exit_attempt
            .lock()
            .retain(|ticket, _| open.iter().any(|p| p.ticket == Some(*ticket)));
    }

    fn debounce_elapsed(&self, ticket: Ticket) -> bool {
        let window = Duration::from_millis(self.config.exit_debounce_ms);
        let mut last = self.last_exit_attempt.lock();
        let now = Instant::now();
        if let Some(at) = last.get(&ticket) {
            if now.duration_since(*at) < window {
                return false;
            }
        }
        last.insert(ticket, now);
        true
    }
}
