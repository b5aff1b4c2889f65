use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Per-page rates are always quoted in $2.50 increments. Fixed business
/// policy, not a tunable.
pub const RATE_STEP: Money = Money::from_cents(250);

/// An amount of money in whole cents.
///
/// All pricing arithmetic stays in integer cents so repeated rebuilds of a
/// sheet produce identical values.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Clamps negative amounts to zero. Corrupt inputs degrade to a free
    /// line rather than a negative charge.
    #[must_use]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 { Money::ZERO } else { self }
    }

    #[must_use]
    pub const fn saturating_add(self, other: Money) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        self.saturating_add(rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({})", self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// Billable pages in tenths of a page.
///
/// The tenth-of-a-page quantum is the rounding unit of the billing formula;
/// keeping pages in tenths makes the round-up exact.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PageTenths(u32);

impl PageTenths {
    pub const ZERO: PageTenths = PageTenths(0);
    pub const ONE_PAGE: PageTenths = PageTenths(10);

    #[must_use]
    pub const fn new(tenths: u32) -> Self {
        Self(tenths)
    }

    #[must_use]
    pub const fn tenths(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn max(self, other: PageTenths) -> PageTenths {
        PageTenths(self.0.max(other.0))
    }
}

impl fmt::Debug for PageTenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageTenths({})", self.0)
    }
}

impl fmt::Display for PageTenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// A scalar multiplier in hundredths (1.15 is stored as 115).
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ONE: Multiplier = Multiplier(100);

    #[must_use]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::ONE
    }
}

impl fmt::Debug for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiplier({})", self.0)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_formats_with_cents() {
        assert_eq!(Money::from_cents(9250).to_string(), "$92.50");
        assert_eq!(Money::from_cents(-30).to_string(), "-$0.30");
        assert_eq!(Money::from_dollars(65).to_string(), "$65.00");
    }

    #[test]
    fn negative_money_clamps_to_zero() {
        assert_eq!(Money::from_cents(-100).clamp_non_negative(), Money::ZERO);
        assert_eq!(
            Money::from_cents(100).clamp_non_negative(),
            Money::from_cents(100)
        );
    }

    #[test]
    fn page_tenths_formats_as_decimal() {
        assert_eq!(PageTenths::new(23).to_string(), "2.3");
        assert_eq!(PageTenths::ZERO.to_string(), "0.0");
    }

    #[test]
    fn money_sum_saturates() {
        let total: Money = [Money::from_cents(i64::MAX), Money::from_cents(1)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), i64::MAX);
    }
}
