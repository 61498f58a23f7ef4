//! Protective (loss-side) exit rules.
//!
//! These run on every tick for every open position and are never
//! gated by higher-timeframe bias. Break-even arming also lives here:
//! the transition is monotonic and flips the position into the
//! profit-managed phase.

use crate::{is_favorable, ExitConfig, ExitState};
use pipwatch_core::{ExitReason, PositionView, Price};
use rust_decimal::Decimal;

/// Evaluate protective rules for one position against the current
/// close-side price. Mutates arming counters and flags on `state`.
pub fn evaluate(
    config: &ExitConfig,
    position: &PositionView,
    price: Price,
    pip_size: Decimal,
    state: &mut ExitState,
) -> Option<ExitReason> {
    let move_price = position.favorable_move(price);
    let move_pips = if pip_size.is_zero() {
        Decimal::ZERO
    } else {
        move_price / pip_size
    };

    if move_pips >= config.min_favorable_pips {
        state.ever_favorable = true;
    }

    // Money stop, after the spread grace window.
    if config.max_loss_money > Decimal::ZERO
        && state.ticks_seen >= config.money_grace_ticks
        && position.profit <= -config.max_loss_money
    {
        return Some(ExitReason::MoneyStop);
    }

    // Price stop takes precedence over the pip variant.
    if config.max_loss_price > Decimal::ZERO {
        if move_price <= -config.max_loss_price {
            return Some(ExitReason::PriceStop);
        }
    } else if config.max_loss_pips > Decimal::ZERO && move_pips <= -config.max_loss_pips {
        return Some(ExitReason::PipStop);
    }

    // Early abort: never favorable within the window and already down
    // far enough.
    if config.early_abort_enabled
        && state.ticks_seen >= config.early_abort_ticks
        && !state.ever_favorable
        && move_pips <= -config.early_abort_loss_pips
    {
        return Some(ExitReason::EarlyAbort);
    }

    if !state.be_armed {
        if state.be_arming_ticks < config.be_arming_ticks {
            state.be_arming_ticks += 1;
        }
        if position.profit <= -config.profit_drop_money {
            return Some(ExitReason::ProfitDrop);
        }
        // Arming requires both the full observation window and a
        // non-negative floating profit on the current tick.
        if state.be_arming_ticks >= config.be_arming_ticks && position.profit >= Decimal::ZERO {
            state.arm();
            // Re-seed the anchor at the arming price so trailing
            // measures regression from here, not from entry spread.
            if is_favorable(position.side, state.anchor, price, Decimal::ZERO) {
                state.anchor = price;
            }
        }
        return None;
    }

    // Armed: track the post-arming drawdown rules.
    if position.profit < Decimal::ZERO {
        state.was_unprofitable_after_be = true;
        if position.profit <= -config.profit_drop_after_be_money {
            return Some(ExitReason::ProfitDropAfterBreakEven);
        }
    } else if state.was_unprofitable_after_be
        && position.profit > Decimal::ZERO
        && position.profit < config.be_recover_band
    {
        return Some(ExitReason::BreakEvenRecovered);
    }

    None
}
