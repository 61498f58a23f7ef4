//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors in price and lot calculations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with volumes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Absolute price distance to another price.
    #[inline]
    pub fn distance(&self, other: Price) -> Decimal {
        (self.0 - other.0).abs()
    }

    /// Distance to another price expressed in pips.
    ///
    /// Returns `None` when `pip_size` is zero (unknown instrument).
    #[inline]
    pub fn pips_from(&self, other: Price, pip_size: Decimal) -> Option<Decimal> {
        if pip_size.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / pip_size)
    }

    /// Round to the instrument's quote precision (number of digits).
    #[inline]
    pub fn round_to_digits(&self, digits: u32) -> Self {
        Self(self.0.round_dp(digits))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Add<Decimal> for Price {
    type Output = Self;

    fn add(self, rhs: Decimal) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Decimal> for Price {
    type Output = Self;

    fn sub(self, rhs: Decimal) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl Neg for Price {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// Trade volume (lots) with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(pub Decimal);

impl Volume {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Scale by a close fraction (partial close). The result is not
    /// lot-step rounded; the broker layer normalizes before submission.
    #[inline]
    pub fn scaled(&self, fraction: Decimal) -> Self {
        Self(self.0 * fraction)
    }

    /// Round down to the instrument's volume step.
    #[inline]
    pub fn round_to_step(&self, step: Volume) -> Self {
        if step.is_zero() {
            return *self;
        }
        Self((self.0 / step.0).floor() * step.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Volume {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Volume {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_pips_from() {
        let entry = Price::new(dec!(1.10000));
        let current = Price::new(dec!(1.10020));

        // 5-digit symbol: pip = 0.0001
        let pips = current.pips_from(entry, dec!(0.0001)).unwrap();
        assert_eq!(pips, dec!(2));

        // Unknown pip size yields None
        assert!(current.pips_from(entry, Decimal::ZERO).is_none());
    }

    #[test]
    fn test_price_round_to_digits() {
        let price = Price::new(dec!(1.234567));
        assert_eq!(price.round_to_digits(5).inner(), dec!(1.23457));
        assert_eq!(price.round_to_digits(3).inner(), dec!(1.235));
    }

    #[test]
    fn test_volume_scaled() {
        let vol = Volume::new(dec!(0.10));
        assert_eq!(vol.scaled(dec!(0.5)).inner(), dec!(0.050));
        assert_eq!(vol.scaled(dec!(1.0)).inner(), dec!(0.100));
    }

    #[test]
    fn test_volume_round_to_step() {
        let vol = Volume::new(dec!(0.1234));
        let step = Volume::new(dec!(0.01));
        assert_eq!(vol.round_to_step(step).inner(), dec!(0.12));
    }
}
