//! Value Objects for the bookstore

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BookstoreError;

/// Voucher code value object, always trimmed and uppercase
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherCode(String);

impl VoucherCode {
    pub const MAX_LEN: usize = 32;

    pub fn new(value: impl AsRef<str>) -> Result<Self, BookstoreError> {
        let value = value.as_ref().trim().to_uppercase();
        if value.is_empty() {
            return Err(BookstoreError::Validation("voucher code is empty".into()));
        }
        if value.chars().count() > Self::MAX_LEN {
            return Err(BookstoreError::Validation(format!("voucher code longer than {} characters", Self::MAX_LEN)));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for VoucherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for VoucherCode {
    type Error = BookstoreError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<VoucherCode> for String {
    fn from(code: VoucherCode) -> Self { code.0 }
}

/// Amount of money in whole Vietnamese đồng. There are no fractional units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn vnd(amount: i64) -> Self { Self(amount) }
    pub const fn amount(&self) -> i64 { self.0 }
    pub fn add(&self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(i64::from(qty))) }

    /// Subtraction floored at zero.
    pub fn saturating_sub(&self, other: Money) -> Money { Money(self.0.saturating_sub(other.0).max(0)) }

    /// `pct` percent of this amount, rounded half up to the nearest đồng.
    pub fn percent(&self, pct: i64) -> Money {
        let scaled = self.0.saturating_mul(pct);
        Money((scaled + 50).div_euclid(100))
    }

    pub fn is_negative(&self) -> bool { self.0 < 0 }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}₫", self.0) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc.add(m)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voucher_code_normalized() {
        let code = VoucherCode::new("  sale10 ").unwrap();
        assert_eq!(code.as_str(), "SALE10");
    }

    #[test]
    fn test_voucher_code_rejects_blank() {
        assert!(VoucherCode::new("   ").is_err());
        assert!(VoucherCode::new("X".repeat(33)).is_err());
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(Money::vnd(200_000).percent(10), Money::vnd(20_000));
        assert_eq!(Money::vnd(79_005).percent(10), Money::vnd(7_901));
        assert_eq!(Money::vnd(79_004).percent(10), Money::vnd(7_900));
    }

    #[test]
    fn test_money_floor_and_sum() {
        assert_eq!(Money::vnd(10).saturating_sub(Money::vnd(50)), Money::ZERO);
        let total: Money = [Money::vnd(79_000).multiply(2), Money::vnd(86_000)].into_iter().sum();
        assert_eq!(total, Money::vnd(244_000));
        assert_eq!(total.to_string(), "244000₫");
    }
}
