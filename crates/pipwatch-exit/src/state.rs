//! Per-position exit state and the higher-timeframe bias cache.

use pipwatch_core::{Price, Side, Symbol, TrendLabel};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Mutable tracking state for one open ticket.
///
/// All fields are declared up front and initialized on first
/// observation; the state is pruned as soon as the ticket no longer
/// appears among open positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitState {
    /// Best favorable price seen since arming (tick side).
    pub anchor: Price,
    pub prev_price: Price,
    pub ticks_seen: u32,
    /// Whether the position ever moved favorably by the configured
    /// minimum.
    pub ever_favorable: bool,
    /// Break-even armed. Monotonic: never cleared while tracked.
    pub be_armed: bool,
    /// Ticks spent in the arming window.
    pub be_arming_ticks: u32,
    /// Ticks observed since arming.
    pub armed_ticks: u32,
    /// Best floating profit seen (account currency).
    pub best_profit: Decimal,
    /// Consecutive ticks the profit giveback has persisted.
    pub breach_ticks: u32,
    pub was_unprofitable_after_be: bool,

    // Candle-close side, advanced only on new closed bars.
    pub anchor_close: Price,
    pub prev_close: Price,
    pub closes_seen: u32,
}

impl ExitState {
    pub fn new(price: Price) -> Self {
        Self {
            anchor: price,
            prev_price: price,
            ticks_seen: 0,
            ever_favorable: false,
            be_armed: false,
            be_arming_ticks: 0,
            armed_ticks: 0,
            best_profit: Decimal::ZERO,
            breach_ticks: 0,
            was_unprofitable_after_be: false,
            anchor_close: price,
            prev_close: price,
            closes_seen: 0,
        }
    }

    /// Advance tick-side bookkeeping after rule evaluation.
    pub fn advance_tick(&mut self, price: Price) {
        self.prev_price = price;
        self.ticks_seen += 1;
        if self.be_armed {
            self.armed_ticks += 1;
        }
    }

    /// Advance candle-side bookkeeping after rule evaluation.
    pub fn advance_close(&mut self, close: Price) {
        self.prev_close = close;
        self.closes_seen += 1;
    }

    pub fn arm(&mut self) {
        self.be_armed = true;
        self.was_unprofitable_after_be = false;
    }
}

/// `price` is strictly favorable versus `reference` for this side,
/// beyond an epsilon in price units.
pub fn is_favorable(side: Side, reference: Price, price: Price, eps: Decimal) -> bool {
    match side {
        Side::Buy => price.inner() > reference.inner() + eps,
        Side::Sell => price.inner() < reference.inner() - eps,
    }
}

/// One symbol's cached higher-timeframe read.
#[derive(Debug, Clone)]
pub struct BiasEntry {
    pub m5: Option<TrendLabel>,
    pub m15: Option<TrendLabel>,
    pub as_of: Instant,
}

/// Per-symbol bias cache written after each signal-generation pass.
#[derive(Debug, Default)]
pub struct BiasStore {
    entries: HashMap<Symbol, BiasEntry>,
}

impl BiasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge-update a symbol's bias: `None` leaves the existing label
    /// in place, the timestamp always refreshes.
    pub fn update(&mut self, symbol: &Symbol, m5: Option<TrendLabel>, m15: Option<TrendLabel>) {
        let entry = self.entries.entry(symbol.clone()).or_insert(BiasEntry {
            m5: None,
            m15: None,
            as_of: Instant::now(),
        });
        if m5.is_some() {
            entry.m5 = m5;
        }
        if m15.is_some() {
            entry.m15 = m15;
        }
        entry.as_of = Instant::now();
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&BiasEntry> {
        self.entries.get(symbol)
    }

    #[cfg(test)]
    pub fn insert_aged(
        &mut self,
        symbol: Symbol,
        m5: Option<TrendLabel>,
        m15: Option<TrendLabel>,
        age: Duration,
    ) {
        let as_of = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        self.entries.insert(symbol, BiasEntry { m5, m15, as_of });
    }
}

/// Whether a profit-taking exit is allowed for `side` on `symbol`.
///
/// Disabled gating, a missing entry, or a stale entry are all
/// permissive. A supportive M15 blocks; an opposing M15 allows; with
/// M15 neutral the M5 read decides (allow only when opposing).
pub fn htf_allows_profit_exit(
    bias: &BiasStore,
    symbol: &Symbol,
    side: Side,
    enabled: bool,
    stale_after: Duration,
    use_m15: bool,
    use_m5: bool,
) -> bool {
    if !enabled {
        return true;
    }
    let entry = match bias.get(symbol) {
        Some(e) => e,
        None => return true,
    };
    if !stale_after.is_zero() && entry.as_of.elapsed() > stale_after {
        return true;
    }
    let m15 = entry.m15.unwrap_or(TrendLabel::Hold);
    let m5 = entry.m5.unwrap_or(TrendLabel::Hold);
    if use_m15 && m15.supports(side) {
        return false;
    }
    if use_m15 && m15.opposes(side) {
        return true;
    }
    if use_m5 {
        return m5.opposes(side);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym() -> Symbol {
        Symbol::from("EURUSD")
    }

    fn allows(bias: &BiasStore, side: Side) -> bool {
        htf_allows_profit_exit(
            bias,
            &sym(),
            side,
            true,
            Duration::from_secs(180),
            true,
            true,
        )
    }

    #[test]
    fn test_no_bias_is_permissive() {
        let bias = BiasStore::new();
        assert!(allows(&bias, Side::Buy));
    }

    #[test]
    fn test_supportive_m15_blocks() {
        let mut bias = BiasStore::new();
        bias.update(&sym(), None, Some(TrendLabel::Buy));
        assert!(!allows(&bias, Side::Buy));
        // Same read opposes a short, so a short's exit is allowed.
        assert!(allows(&bias, Side::Sell));
    }

    #[test]
    fn test_neutral_m15_defers_to_m5() {
        let mut bias = BiasStore::new();
        bias.update(&sym(), Some(TrendLabel::Sell), Some(TrendLabel::Hold));
        // M5 opposes the long: allow.
        assert!(allows(&bias, Side::Buy));
        // M5 supports the short but only an opposing M5 allows: block.
        assert!(!allows(&bias, Side::Sell));
    }

    #[test]
    fn test_stale_bias_is_permissive() {
        let mut bias = BiasStore::new();
        bias.insert_aged(
            sym(),
            None,
            Some(TrendLabel::Buy),
            Duration::from_secs(600),
        );
        assert!(allows(&bias, Side::Buy));
    }

    #[test]
    fn test_disabled_gating_is_permissive() {
        let mut bias = BiasStore::new();
        bias.update(&sym(), None, Some(TrendLabel::Buy));
        assert!(htf_allows_profit_exit(
            &bias,
            &sym(),
            Side::Buy,
            false,
            Duration::from_secs(180),
            true,
            true,
        ));
    }

    #[test]
    fn test_arming_is_monotonic() {
        let mut state = ExitState::new(Price::new(dec!(1.1)));
        assert!(!state.be_armed);
        state.arm();
        assert!(state.be_armed);
        state.advance_tick(Price::new(dec!(1.2)));
        assert!(state.be_armed);
        assert_eq!(state.armed_ticks, 1);
    }

    #[test]
    fn test_favorable_with_epsilon() {
        let anchor = Price::new(dec!(1.1000));
        assert!(is_favorable(
            Side::Buy,
            anchor,
            Price::new(dec!(1.1001)),
            Decimal::ZERO
        ));
        // Inside epsilon: not favorable
        assert!(!is_favorable(
            Side::Buy,
            anchor,
            Price::new(dec!(1.1001)),
            dec!(0.0002)
        ));
        assert!(is_favorable(
            Side::Sell,
            anchor,
            Price::new(dec!(1.0999)),
            Decimal::ZERO
        ));
    }
}
