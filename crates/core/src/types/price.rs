//! Integer price representation.
//!
//! Prices are whole currency units (VND has no minor unit). The backend
//! serializes them as JSON doubles, so [`Price::from_wire`] is the single
//! place where a float is allowed to become a price.

use core::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when converting a wire value into a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    /// The value is NaN or infinite.
    #[error("price must be a finite number")]
    NotFinite,
    /// The value is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(f64),
    /// The value does not fit in a `u64` after rounding.
    #[error("price is out of range")]
    OutOfRange,
}

/// A price in whole currency units.
///
/// ## Examples
///
/// ```
/// use bikeshop_core::Price;
///
/// let price = Price::from_wire(1_000_000.0).unwrap();
/// assert_eq!(price.to_string(), "1.000.000 VND");
/// assert_eq!(price.times(3).unwrap().amount(), 3_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create a price from whole units.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Whole-unit amount.
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.0
    }

    /// Convert a backend JSON number into a price.
    ///
    /// Fractional amounts are rounded half away from zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not finite, negative, or too large.
    pub fn from_wire(value: f64) -> Result<Self, PriceError> {
        if !value.is_finite() {
            return Err(PriceError::NotFinite);
        }
        if value < 0.0 {
            return Err(PriceError::Negative(value));
        }

        Decimal::from_f64(value)
            .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|d| d.to_u64())
            .map(Self)
            .ok_or(PriceError::OutOfRange)
    }

    /// Price multiplied by a quantity, or `None` on overflow.
    #[must_use]
    pub fn times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(u64::from(quantity)).map(Self)
    }

    /// Sum of two prices, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Price {
    /// Formats with vi-VN digit grouping, e.g. `1.250.000 VND`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{grouped} VND")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_whole_amount() {
        assert_eq!(Price::from_wire(1_000_000.0).unwrap(), Price::new(1_000_000));
    }

    #[test]
    fn test_from_wire_rounds_half_away_from_zero() {
        assert_eq!(Price::from_wire(1499.5).unwrap(), Price::new(1500));
        assert_eq!(Price::from_wire(1499.4).unwrap(), Price::new(1499));
    }

    #[test]
    fn test_from_wire_rejects_negative() {
        assert!(matches!(Price::from_wire(-1.0), Err(PriceError::Negative(_))));
    }

    #[test]
    fn test_from_wire_rejects_nan() {
        assert_eq!(Price::from_wire(f64::NAN), Err(PriceError::NotFinite));
        assert_eq!(Price::from_wire(f64::INFINITY), Err(PriceError::NotFinite));
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(Price::new(0).to_string(), "0 VND");
        assert_eq!(Price::new(999).to_string(), "999 VND");
        assert_eq!(Price::new(1000).to_string(), "1.000 VND");
        assert_eq!(Price::new(12_345_678).to_string(), "12.345.678 VND");
    }

    #[test]
    fn test_times_overflow() {
        assert_eq!(Price::new(u64::MAX).times(2), None);
        assert_eq!(Price::new(250).times(4), Some(Price::new(1000)));
    }
}
