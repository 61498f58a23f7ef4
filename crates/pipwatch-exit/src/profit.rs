//! Profit-taking exit rules.
//!
//! These only run once a position is break-even armed, and the engine
//! applies higher-timeframe gating to whatever they return. Tick and
//! candle-close paths keep independent anchors so the hybrid mode can
//! run either or both.

use crate::{is_favorable, ExitConfig, ExitState};
use pipwatch_core::{ExitReason, PositionView, Price};
use rust_decimal::Decimal;

/// Evaluate profit rules for one armed position against the current
/// close-side price. Mutates the tick-side anchor and breach
/// trackers on `state`. `buffer_pips` is resolved by the engine
/// (ATR-scaled or fixed).
pub fn evaluate_tick(
    config: &ExitConfig,
    position: &PositionView,
    price: Price,
    pip_size: Decimal,
    buffer_pips: Decimal,
    state: &mut ExitState,
) -> Option<ExitReason> {
    let profit_pips = position.favorable_move(price) / pip_size;
    let eps = config.eps_pips * pip_size;
    let in_profit = profit_pips >= config.min_profit_pips;

    // Reversal in profit: one adverse tick is enough once past the
    // profit threshold.
    if config.exit_on_first_reversal_in_profit && state.armed_ticks > 0 && in_profit {
        let adverse = is_favorable(position.side.closing(), state.prev_price, price, eps);
        let favorable = is_favorable(position.side, state.prev_price, price, eps);
        if adverse || (config.treat_flat_as_reversal && !favorable) {
            return Some(ExitReason::FirstReversalInProfit);
        }
    }

    // Anchor trailing: ratchet the anchor forward, exit when price
    // gives back more than the buffer.
    if is_favorable(position.side, state.anchor, price, Decimal::ZERO) {
        state.anchor = price;
    }
    if state.armed_ticks >= config.buffer_start_tick && in_profit {
        let retrace = match position.side {
            pipwatch_core::Side::Buy => state.anchor.inner() - price.inner(),
            pipwatch_core::Side::Sell => price.inner() - state.anchor.inner(),
        };
        if retrace >= buffer_pips * pip_size {
            return Some(ExitReason::BufferBreach);
        }
    }

    // Breach-and-timeout on best floating profit.
    if position.profit > state.best_profit {
        state.best_profit = position.profit;
        state.breach_ticks = 0;
    }
    if position.profit > Decimal::ZERO && position.profit < state.best_profit {
        if state.best_profit - position.profit > config.breach_threshold_money {
            return Some(ExitReason::BufferBreach);
        }
        state.breach_ticks += 1;
        if state.breach_ticks >= config.breach_tick_limit {
            return Some(ExitReason::BreachTimeout);
        }
    } else {
        state.breach_ticks = 0;
    }

    None
}

/// Candle-close mirror of the armed-phase rules, against the
/// independent close-side anchor. Advances only on new closed bars.
pub fn evaluate_close(
    config: &ExitConfig,
    position: &PositionView,
    close: Price,
    pip_size: Decimal,
    buffer_pips: Decimal,
    state: &mut ExitState,
) -> Option<ExitReason> {
    let profit_pips = position.favorable_move(close) / pip_size;
    let eps = config.eps_pips * pip_size;
    let in_profit = profit_pips >= config.min_profit_pips;

    if config.exit_on_first_reversal_in_profit && state.closes_seen > 0 && in_profit {
        let adverse = is_favorable(position.side.closing(), state.prev_close, close, eps);
        let favorable = is_favorable(position.side, state.prev_close, close, eps);
        if adverse || (config.treat_flat_as_reversal && !favorable) {
            return Some(ExitReason::FirstReversalInProfit);
        }
    }

    if is_favorable(position.side, state.anchor_close, close, Decimal::ZERO) {
        state.anchor_close = close;
    }
    if state.closes_seen >= config.buffer_start_candle && in_profit {
        let retrace = match position.side {
            pipwatch_core::Side::Buy => state.anchor_close.inner() - close.inner(),
            pipwatch_core::Side::Sell => close.inner() - state.anchor_close.inner(),
        };
        if retrace >= buffer_pips * pip_size {
            return Some(ExitReason::BufferBreach);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipwatch_core::{PositionSnapshot, Side, Symbol, Ticket, Volume};
    use rust_decimal_macros::dec;

    const PIP: Decimal = dec!(0.0001);

    fn position(side: Side, entry: Decimal, profit: Decimal) -> PositionView {
        PositionView::from_snapshot(&PositionSnapshot::filled(
            Ticket::new(7),
            Symbol::from("EURUSD"),
            side,
            Price::new(entry),
            Volume::new(dec!(0.10)),
            profit,
        ))
        .unwrap()
    }

    fn armed_state(price: Decimal) -> ExitState {
        let mut state = ExitState::new(Price::new(price));
        state.arm();
        state
    }

    #[test]
    fn test_reversal_in_profit() {
        let config = ExitConfig::default();
        // Long from 1.1000, now 5 pips up.
        let pos = position(Side::Buy, dec!(1.10000), dec!(5));
        let mut state = armed_state(dec!(1.10000));
        state.armed_ticks = 1;
        state.prev_price = Price::new(dec!(1.10060));

        // Price pulled back one tick while in profit: exit.
        assert_eq!(
            evaluate_tick(&config, &pos, Price::new(dec!(1.10050)), PIP, config.buffer_pips, &mut state),
            Some(ExitReason::FirstReversalInProfit)
        );
    }

    #[test]
    fn test_no_reversal_below_profit_threshold() {
        let config = ExitConfig::default();
        // Only 1 pip up: below min_profit_pips = 2.
        let pos = position(Side::Buy, dec!(1.10000), dec!(0.5));
        let mut state = armed_state(dec!(1.10000));
        state.armed_ticks = 1;
        state.prev_price = Price::new(dec!(1.10015));

        assert_eq!(
            evaluate_tick(&config, &pos, Price::new(dec!(1.10010)), PIP, config.buffer_pips, &mut state),
            None
        );
    }

    #[test]
    fn test_buffer_breach_short() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            ..ExitConfig::default()
        };
        // Short from 1.10100; anchor (best favorable) at 1.10050.
        let pos = position(Side::Sell, dec!(1.10100), dec!(5));
        let mut state = armed_state(dec!(1.10050));
        state.armed_ticks = config.buffer_start_tick;
        state.prev_price = Price::new(dec!(1.10050));

        // Regression short of the buffer: hold.
        assert_eq!(
            evaluate_tick(&config, &pos, Price::new(dec!(1.10069)), PIP, config.buffer_pips, &mut state),
            None
        );
        // Full 2-pip regression: breach.
        state.breach_ticks = 0;
        assert_eq!(
            evaluate_tick(&config, &pos, Price::new(dec!(1.10070)), PIP, config.buffer_pips, &mut state),
            Some(ExitReason::BufferBreach)
        );
    }

    #[test]
    fn test_anchor_ratchets_forward() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            ..ExitConfig::default()
        };
        let pos = position(Side::Buy, dec!(1.10000), dec!(5));
        let mut state = armed_state(dec!(1.10000));

        evaluate_tick(&config, &pos, Price::new(dec!(1.10040)), PIP, config.buffer_pips, &mut state);
        assert_eq!(state.anchor, Price::new(dec!(1.10040)));
        evaluate_tick(&config, &pos, Price::new(dec!(1.10080)), PIP, config.buffer_pips, &mut state);
        assert_eq!(state.anchor, Price::new(dec!(1.10080)));
        // A pullback never moves the anchor back.
        evaluate_tick(&config, &pos, Price::new(dec!(1.10060)), PIP, config.buffer_pips, &mut state);
        assert_eq!(state.anchor, Price::new(dec!(1.10080)));
    }

    #[test]
    fn test_large_giveback_exits_immediately() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            ..ExitConfig::default()
        };
        let mut state = armed_state(dec!(1.10000));
        state.best_profit = dec!(0.50);

        // Giveback of 0.45 > threshold 0.04: immediate.
        let pos = position(Side::Buy, dec!(1.10000), dec!(0.05));
        assert_eq!(
            evaluate_tick(&config, &pos, Price::new(dec!(1.10001)), PIP, config.buffer_pips, &mut state),
            Some(ExitReason::BufferBreach)
        );
    }

    #[test]
    fn test_small_giveback_counts_down_then_exits() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            breach_tick_limit: 3,
            ..ExitConfig::default()
        };
        let mut state = armed_state(dec!(1.10000));
        state.best_profit = dec!(0.10);

        // Giveback of 0.02, inside the threshold: counts ticks.
        let pos = position(Side::Buy, dec!(1.10000), dec!(0.08));
        let price = Price::new(dec!(1.10001));
        assert_eq!(evaluate_tick(&config, &pos, price, PIP, config.buffer_pips, &mut state), None);
        assert_eq!(evaluate_tick(&config, &pos, price, PIP, config.buffer_pips, &mut state), None);
        assert_eq!(
            evaluate_tick(&config, &pos, price, PIP, config.buffer_pips, &mut state),
            Some(ExitReason::BreachTimeout)
        );
    }

    #[test]
    fn test_recovery_resets_countdown() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            breach_tick_limit: 3,
            ..ExitConfig::default()
        };
        let mut state = armed_state(dec!(1.10000));
        state.best_profit = dec!(0.10);

        let dipped = position(Side::Buy, dec!(1.10000), dec!(0.08));
        let price = Price::new(dec!(1.10001));
        evaluate_tick(&config, &dipped, price, PIP, config.buffer_pips, &mut state);
        assert_eq!(state.breach_ticks, 1);

        // New best profit clears the countdown.
        let recovered = position(Side::Buy, dec!(1.10000), dec!(0.12));
        evaluate_tick(&config, &recovered, price, PIP, config.buffer_pips, &mut state);
        assert_eq!(state.breach_ticks, 0);
        assert_eq!(state.best_profit, dec!(0.12));
    }

    #[test]
    fn test_candle_close_reversal() {
        let config = ExitConfig::default();
        let pos = position(Side::Buy, dec!(1.10000), dec!(5));
        let mut state = armed_state(dec!(1.10000));
        state.closes_seen = 1;
        state.prev_close = Price::new(dec!(1.10060));

        assert_eq!(
            evaluate_close(&config, &pos, Price::new(dec!(1.10045)), PIP, config.buffer_pips, &mut state),
            Some(ExitReason::FirstReversalInProfit)
        );
    }

    #[test]
    fn test_candle_close_buffer_waits_for_arming_count() {
        let config = ExitConfig {
            exit_on_first_reversal_in_profit: false,
            ..ExitConfig::default()
        };
        let pos = position(Side::Buy, dec!(1.10000), dec!(5));
        let mut state = armed_state(dec!(1.10000));
        state.anchor_close = Price::new(dec!(1.10080));

        // Only one close seen: trailing not yet active.
        state.closes_seen = 1;
        assert_eq!(
            evaluate_close(&config, &pos, Price::new(dec!(1.10050)), PIP, config.buffer_pips, &mut state),
            None
        );

        state.closes_seen = config.buffer_start_candle;
        assert_eq!(
            evaluate_close(&config, &pos, Price::new(dec!(1.10050)), PIP, config.buffer_pips, &mut state),
            Some(ExitReason::BufferBreach)
        );
    }
}
