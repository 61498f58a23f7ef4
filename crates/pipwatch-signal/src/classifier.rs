//! Trend classification over candle history.

use pipwatch_core::{Candle, TrendLabel};
use rust_decimal::Decimal;

/// Directional read of one timeframe's candle history. Indicator
/// math plugs in behind this seam.
pub trait TrendClassifier: Send + Sync {
    fn classify(&self, candles: &[Candle]) -> TrendLabel;
}

/// Fast/slow moving-average crossover read.
#[derive(Debug, Clone)]
pub struct SmaCrossClassifier {
    pub fast: usize,
    pub slow: usize,
}

impl SmaCrossClassifier {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }
}

impl Default for SmaCrossClassifier {
    fn default() -> Self {
        Self { fast: 5, slow: 20 }
    }
}

/// Mean of the last `period` closes, `None` when history is short.
pub(crate) fn sma(candles: &[Candle], period: usize) -> Option<Decimal> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let sum: Decimal = candles[candles.len() - period..]
        .iter()
        .map(|c| c.close.inner())
        .sum();
    Some(sum / Decimal::from(period as u64))
}

impl TrendClassifier for SmaCrossClassifier {
    fn classify(&self, candles: &[Candle]) -> TrendLabel {
        let (fast, slow) = match (sma(candles, self.fast), sma(candles, self.slow)) {
            (Some(f), Some(s)) => (f, s),
            _ => return TrendLabel::Hold,
        };
        if fast > slow {
            TrendLabel::Buy
        } else if fast < slow {
            TrendLabel::Sell
        } else {
            TrendLabel::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtf::tests::candles_from_closes;
    use rust_decimal_macros::dec;

    #[test]
    fn test_short_history_is_hold() {
        let classifier = SmaCrossClassifier::new(2, 5);
        let candles = candles_from_closes(&[dec!(1.0), dec!(1.1)]);
        assert_eq!(classifier.classify(&candles), TrendLabel::Hold);
    }

    #[test]
    fn test_rising_closes_read_buy() {
        let classifier = SmaCrossClassifier::new(2, 4);
        let candles = candles_from_closes(&[dec!(1.0), dec!(1.1), dec!(1.2), dec!(1.3)]);
        assert_eq!(classifier.classify(&candles), TrendLabel::Buy);
    }

    #[test]
    fn test_falling_closes_read_sell() {
        let classifier = SmaCrossClassifier::new(2, 4);
        let candles = candles_from_closes(&[dec!(1.3), dec!(1.2), dec!(1.1), dec!(1.0)]);
        assert_eq!(classifier.classify(&candles), TrendLabel::Sell);
    }
}
