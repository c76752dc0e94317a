// Fixed-point money amounts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Base units per whole coin (8 decimal places)
pub const COIN: u64 = 100_000_000;

/// Monetary amount in base units (1 coin = 100,000,000 units)
///
/// Amounts are never negative; subtraction that would underflow is a
/// checked operation at validation sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    /// Zero amount
    pub fn zero() -> Self {
        Self(0)
    }

    /// Create from a whole number of coins
    pub fn from_whole(coins: u64) -> Self {
        Self(coins * COIN)
    }

    /// Convert a whole-coin floating point value (as received over HTTP)
    /// into base units. Rejects negative and non-finite values.
    pub fn from_coins(coins: f64) -> Option<Self> {
        if !coins.is_finite() || coins < 0.0 {
            return None;
        }
        let units = (coins * COIN as f64).round();
        if units > u64::MAX as f64 {
            return None;
        }
        Some(Self(units as u64))
    }

    /// Whole-coin value for client-facing responses
    pub fn as_coins(&self) -> f64 {
        self.0 as f64 / COIN as f64
    }

    /// Raw base units
    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Self(iter.map(|a| a.0).sum())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.8}", self.as_coins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_coins() {
        assert_eq!(Amount::from_coins(10.0), Some(Amount(10 * COIN)));
        assert_eq!(Amount::from_coins(0.1), Some(Amount(10_000_000)));
        assert_eq!(Amount::from_coins(0.0), Some(Amount::zero()));
    }

    #[test]
    fn test_from_coins_rejects_invalid() {
        assert_eq!(Amount::from_coins(-1.0), None);
        assert_eq!(Amount::from_coins(f64::NAN), None);
        assert_eq!(Amount::from_coins(f64::INFINITY), None);
    }

    #[test]
    fn test_round_trip() {
        let amount = Amount::from_coins(3.0).unwrap();
        assert_eq!(amount.as_coins(), 3.0);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_whole(10);
        let b = Amount::from_coins(3.1).unwrap();

        assert_eq!(a.checked_sub(b), Some(Amount(690_000_000)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(a.checked_add(b), Some(Amount(1_310_000_000)));
    }

    #[test]
    fn test_sum() {
        let total: Amount = vec![Amount(100), Amount(200), Amount(300)]
            .into_iter()
            .sum();
        assert_eq!(total, Amount(600));
    }

    #[test]
    fn test_serde_as_units() {
        let amount = Amount::from_whole(10);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "1000000000");

        let decoded: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, amount);
    }
}
