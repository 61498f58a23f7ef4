//! N-tick entry confirmation.
//!
//! A candle-close signal does not execute immediately: it becomes
//! pending, and only a run of consecutive favorable ticks from the
//! signal bar's close confirms it. Any unfavorable tick restarts the
//! run from the pending entry price; a new entry bar hard-resets the
//! whole machine. One instance per symbol.

use crate::SignalConfig;
use chrono::{DateTime, Utc};
use pipwatch_core::{Price, TradeSignal, TrendLabel};
use rust_decimal::Decimal;
use tracing::debug;

pub struct NTickConfirm {
    config: SignalConfig,
    pending: Option<TrendLabel>,
    pending_entry_price: Option<Price>,
    last_tick_price: Option<Price>,
    streak: u32,
    last_signal: Option<TradeSignal>,
    last_bar_time: Option<DateTime<Utc>>,
    confirmed: Option<TradeSignal>,
}

impl NTickConfirm {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            pending: None,
            pending_entry_price: None,
            last_tick_price: None,
            streak: 0,
            last_signal: None,
            last_bar_time: None,
            confirmed: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed a candle-close signal. Returns the signal to act on now:
    /// the original when n-tick confirmation is disabled, otherwise a
    /// held copy while confirmation runs.
    pub fn on_candle_signal(&mut self, signal: TradeSignal, bar_time: DateTime<Utc>) -> TradeSignal {
        if self.config.n_ticks == 0 {
            return signal;
        }

        // A new entry bar invalidates any run in progress.
        if self.last_bar_time != Some(bar_time) {
            if self.pending.is_some() {
                debug!(symbol = %signal.symbol, "new entry bar, n-tick state reset");
            }
            self.reset();
            self.last_bar_time = Some(bar_time);
        }

        if signal.is_actionable() && self.pending != Some(signal.final_signal) {
            self.pending = Some(signal.final_signal);
            self.pending_entry_price = signal.entry_price;
            self.last_tick_price = None;
            self.streak = 0;
            self.last_signal = Some(signal.clone());
            debug!(
                symbol = %signal.symbol,
                direction = %signal.final_signal,
                n = self.config.n_ticks,
                "signal pending n-tick confirmation"
            );
        } else if !signal.is_actionable() && !self.is_waiting() {
            self.reset();
        }

        let mut held = signal;
        held.final_signal = TrendLabel::Hold;
        held
    }

    /// Advance the run with a new tick price. A confirmed signal is
    /// buffered for [`Self::take_confirmed`].
    pub fn on_tick(&mut self, price: Price, spread_points: Option<Decimal>) {
        let direction = match self.pending {
            Some(d) => d,
            None => return,
        };
        if let (Some(max), Some(spread)) = (self.config.max_spread_points, spread_points) {
            if spread > max {
                self.streak = 0;
                self.last_tick_price = None;
                return;
            }
        }

        let reference = self
            .last_tick_price
            .or(self.pending_entry_price)
            .unwrap_or(price);
        let movement = price.inner() - reference.inner();
        let favorable = match direction {
            TrendLabel::Buy => movement >= self.config.min_tick_move,
            TrendLabel::Sell => movement <= -self.config.min_tick_move,
            TrendLabel::Hold => false,
        };

        if favorable {
            self.streak += 1;
            self.last_tick_price = Some(price);
            if self.streak >= self.config.n_ticks {
                let mut confirmed = match self.last_signal.clone() {
                    Some(s) => s,
                    None => {
                        self.reset();
                        return;
                    }
                };
                confirmed.final_signal = direction;
                confirmed.entry_price = Some(price);
                debug!(
                    symbol = %confirmed.symbol,
                    direction = %direction,
                    "n-tick run complete, signal confirmed"
                );
                self.confirmed = Some(confirmed);
                self.reset();
            }
        } else {
            // Restart the run from the signal bar's close.
            self.streak = 0;
            self.last_tick_price = self.pending_entry_price;
        }
    }

    /// Take the buffered confirmed signal, if any.
    pub fn take_confirmed(&mut self) -> Option<TradeSignal> {
        self.confirmed.take()
    }

    fn reset(&mut self) {
        self.pending = None;
        self.pending_entry_price = None;
        self.last_tick_price = None;
        self.streak = 0;
        self.last_signal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pipwatch_core::Symbol;
    use rust_decimal_macros::dec;

    fn bar(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + n * 60, 0).unwrap()
    }

    fn buy_signal() -> TradeSignal {
        TradeSignal {
            symbol: Symbol::from("EURUSD"),
            final_signal: TrendLabel::Buy,
            m15_bias: TrendLabel::Buy,
            m5_confirm: TrendLabel::Buy,
            m1_entry: TrendLabel::Buy,
            pullback_completed: true,
            entry_price: Some(Price::new(dec!(1.10000))),
            lot: None,
        }
    }

    fn machine() -> NTickConfirm {
        NTickConfirm::new(SignalConfig {
            n_ticks: 3,
            ..SignalConfig::default()
        })
    }

    #[test]
    fn test_signal_is_held_then_confirmed_after_streak() {
        let mut m = machine();
        let held = m.on_candle_signal(buy_signal(), bar(0));
        assert_eq!(held.final_signal, TrendLabel::Hold);
        assert!(m.is_waiting());

        m.on_tick(Price::new(dec!(1.10001)), None);
        m.on_tick(Price::new(dec!(1.10002)), None);
        assert!(m.take_confirmed().is_none());
        m.on_tick(Price::new(dec!(1.10003)), None);

        let confirmed = m.take_confirmed().unwrap();
        assert_eq!(confirmed.final_signal, TrendLabel::Buy);
        assert_eq!(confirmed.entry_price, Some(Price::new(dec!(1.10003))));
        assert!(!m.is_waiting());
    }

    #[test]
    fn test_unfavorable_tick_restarts_run() {
        let mut m = machine();
        m.on_candle_signal(buy_signal(), bar(0));

        m.on_tick(Price::new(dec!(1.10001)), None);
        m.on_tick(Price::new(dec!(1.10002)), None);
        // Pullback under the last favorable price: run restarts from
        // the pending entry price.
        m.on_tick(Price::new(dec!(1.09990)), None);
        assert!(m.take_confirmed().is_none());

        m.on_tick(Price::new(dec!(1.10001)), None);
        m.on_tick(Price::new(dec!(1.10002)), None);
        m.on_tick(Price::new(dec!(1.10003)), None);
        assert!(m.take_confirmed().is_some());
    }

    #[test]
    fn test_new_bar_hard_resets() {
        let mut m = machine();
        m.on_candle_signal(buy_signal(), bar(0));
        m.on_tick(Price::new(dec!(1.10001)), None);
        m.on_tick(Price::new(dec!(1.10002)), None);

        // Next bar arrives with no actionable signal: run dies.
        let mut hold = buy_signal();
        hold.final_signal = TrendLabel::Hold;
        m.on_candle_signal(hold, bar(1));
        assert!(!m.is_waiting());

        m.on_tick(Price::new(dec!(1.10003)), None);
        assert!(m.take_confirmed().is_none());
    }

    #[test]
    fn test_spread_filter_resets_streak() {
        let mut m = NTickConfirm::new(SignalConfig {
            n_ticks: 2,
            max_spread_points: Some(dec!(20)),
            ..SignalConfig::default()
        });
        m.on_candle_signal(buy_signal(), bar(0));

        m.on_tick(Price::new(dec!(1.10001)), Some(dec!(10)));
        // Wide spread: streak cleared.
        m.on_tick(Price::new(dec!(1.10002)), Some(dec!(30)));
        m.on_tick(Price::new(dec!(1.10003)), Some(dec!(10)));
        assert!(m.take_confirmed().is_none());
        m.on_tick(Price::new(dec!(1.10004)), Some(dec!(10)));
        assert!(m.take_confirmed().is_some());
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut m = NTickConfirm::new(SignalConfig {
            n_ticks: 0,
            ..SignalConfig::default()
        });
        let out = m.on_candle_signal(buy_signal(), bar(0));
        assert_eq!(out.final_signal, TrendLabel::Buy);
    }
}
