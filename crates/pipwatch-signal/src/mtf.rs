//! Multi-timeframe signal generation.

use crate::classifier::sma;
use crate::{SignalConfig, TrendClassifier};
use pipwatch_core::{Candle, Symbol, Timeframe, TradeSignal, TrendLabel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct MtfSignalGenerator {
    config: SignalConfig,
    classifier: Arc<dyn TrendClassifier>,
}

impl MtfSignalGenerator {
    pub fn new(config: SignalConfig, classifier: Arc<dyn TrendClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Evaluate one symbol from per-timeframe candle history. A
    /// missing or empty timeframe reads as `Hold`, which keeps the
    /// final signal at `Hold` without erroring.
    pub fn generate(
        &self,
        symbol: &Symbol,
        candles_by_tf: &HashMap<Timeframe, Vec<Candle>>,
    ) -> TradeSignal {
        let read = |tf: Timeframe| -> TrendLabel {
            match candles_by_tf.get(&tf) {
                Some(candles) if !candles.is_empty() => self.classifier.classify(candles),
                _ => TrendLabel::Hold,
            }
        };

        let bias = read(self.config.tf_bias);
        let confirm = read(self.config.tf_confirm);
        let entry = read(self.config.tf_entry);

        let entry_candles = candles_by_tf
            .get(&self.config.tf_entry)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let pullback = self.pullback_completed(entry_candles);

        let aligned = bias != TrendLabel::Hold && bias == confirm && confirm == entry;
        let final_signal = if aligned && pullback {
            bias
        } else {
            TrendLabel::Hold
        };

        debug!(
            symbol = %symbol,
            bias = %bias,
            confirm = %confirm,
            entry = %entry,
            pullback,
            signal = %final_signal,
            "signal evaluated"
        );

        TradeSignal {
            symbol: symbol.clone(),
            final_signal,
            m15_bias: bias,
            m5_confirm: confirm,
            m1_entry: entry,
            pullback_completed: pullback,
            entry_price: entry_candles.last().map(|c| c.close),
            lot: None,
        }
    }

    /// Pullback filter on the entry timeframe: price was below the
    /// SMA in the bars just before the averaging window and the last
    /// close is back above it.
    fn pullback_completed(&self, candles: &[Candle]) -> bool {
        let period = self.config.pullback_period;
        let lookback = self.config.pullback_lookback;
        if candles.len() < period + 1 {
            return false;
        }
        let sma_now = match sma(candles, period) {
            Some(v) => v,
            None => return false,
        };
        let window_start = candles.len().saturating_sub(period + lookback);
        let window_end = candles.len() - period;
        let was_below = candles[window_start..window_end]
            .iter()
            .any(|c| c.close.inner() < sma_now);
        let now_above = candles
            .last()
            .map(|c| c.close.inner() > sma_now)
            .unwrap_or(false);
        was_below && now_above
    }
}
