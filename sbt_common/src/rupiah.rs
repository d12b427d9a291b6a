use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const IDR_CURRENCY_CODE: &str = "IDR";
pub const IDR_CURRENCY_CODE_LOWER: &str = "idr";

//--------------------------------------      Rupiah       -----------------------------------------------------------
/// An amount of Indonesian Rupiah, in whole rupiah. There are no fractional rupiah in this system.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rupiah(i64);

op!(binary Rupiah, Add, add);
op!(binary Rupiah, Sub, sub);
op!(inplace Rupiah, AddAssign, add_assign);
op!(inplace Rupiah, SubAssign, sub_assign);
op!(unary Rupiah, Neg, neg);

impl Mul<i64> for Rupiah {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Rupiah {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in rupiah: {0}")]
pub struct RupiahConversionError(String);

impl From<i64> for Rupiah {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Rupiah {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Rupiah {}

impl TryFrom<u64> for Rupiah {
    type Error = RupiahConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(RupiahConversionError(format!("Value {} is too large to convert to Rupiah", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Rupiah {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}Rp{}", group_thousands(self.0.unsigned_abs()))
    }
}

impl Rupiah {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The absolute difference between two amounts, in whole rupiah. Used for near-equality matching of
    /// payment notifications against amounts that carry a uniquifier.
    pub fn abs_diff(&self, other: Rupiah) -> i64 {
        (self.0 - other.0).abs()
    }
}

/// Formats an integer with `.` as the thousands separator, as is customary for rupiah amounts.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 3 == offset {
            out.push('.');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Rupiah::from(0).to_string(), "Rp0");
        assert_eq!(Rupiah::from(999).to_string(), "Rp999");
        assert_eq!(Rupiah::from(1_000).to_string(), "Rp1.000");
        assert_eq!(Rupiah::from(50_127).to_string(), "Rp50.127");
        assert_eq!(Rupiah::from(1_250_000).to_string(), "Rp1.250.000");
        assert_eq!(Rupiah::from(-15_000).to_string(), "-Rp15.000");
    }

    #[test]
    fn arithmetic() {
        let a = Rupiah::from(10_000);
        let b = Rupiah::from(2_500);
        assert_eq!(a + b, Rupiah::from(12_500));
        assert_eq!(a - b, Rupiah::from(7_500));
        assert_eq!(b * 4, Rupiah::from(10_000));
        assert_eq!((-b).value(), -2_500);
        assert_eq!(a.abs_diff(b), 7_500);
        let total: Rupiah = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Rupiah::from(15_000));
    }
}
