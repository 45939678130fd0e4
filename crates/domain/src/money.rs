//! Monetary amounts.

use serde::{Deserialize, Serialize};

/// Money amount in integer cents.
///
/// Serialized as a bare integer so event payloads stay readable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Unit price times quantity, `None` on overflow.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Integer average over `count` items, rounded half away from zero.
    /// Zero when `count` is zero.
    pub fn average_over(&self, count: u64) -> Money {
        if count == 0 {
            return Money::zero();
        }
        let count = count as i64;
        let half = count / 2;
        let rounded = if self.0 >= 0 {
            (self.0 + half) / count
        } else {
            (self.0 - half) / count
        };
        Money(rounded)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_dollars_and_cents() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_checked_times_multiplies_unit_price() {
        assert_eq!(Money::from_cents(1999).checked_times(3), Some(Money::from_cents(5997)));
        assert_eq!(Money::from_cents(1999).checked_times(0), Some(Money::zero()));
    }

    #[test]
    fn test_checked_times_detects_overflow() {
        assert_eq!(Money::from_cents(i64::MAX / 2).checked_times(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_times(1), Some(Money::from_cents(i64::MAX)));
    }

    #[test]
    fn test_average_rounds_half_up() {
        assert_eq!(Money::from_cents(1000).average_over(3).cents(), 333);
        assert_eq!(Money::from_cents(1001).average_over(2).cents(), 501);
        assert_eq!(Money::from_cents(1000).average_over(0), Money::zero());
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        let json = serde_json::to_value(Money::from_cents(2500)).unwrap();
        assert_eq!(json, serde_json::json!(2500));
    }

    #[test]
    fn test_sums_amounts() {
        let total: Money = [100, 250, 50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 400);
    }
}
