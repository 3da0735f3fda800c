//! Fixed-point money amounts.
//!
//! Amounts are stored as a whole number of minor units (hundredths), so that
//! `paid - price` is always exact. Parsing accepts at most two decimal places;
//! anything finer is rejected rather than rounded.

use crate::error::MoneyError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of minor units in one major unit
pub const MINOR_PER_UNIT: i64 = 100;

/// Digits after the decimal point
pub const SCALE: usize = 2;

/// An exact decimal amount with two fractional digits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero
    pub const ZERO: Money = Money(0);

    /// Create from minor units, e.g. `Money::from_minor(150)` is `1.50`
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// The amount in minor units
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Whether the amount is greater than zero
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is below zero
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add, failing on overflow
    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or(MoneyError::Overflow)
    }

    /// Subtract, failing on overflow
    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiply by a count, failing on overflow
    pub fn checked_mul(self, count: u64) -> Result<Money, MoneyError> {
        i64::try_from(count)
            .ok()
            .and_then(|count| self.0.checked_mul(count))
            .map(Money)
            .ok_or(MoneyError::Overflow)
    }

    /// How many whole `unit`s fit in this amount, and what is left over
    ///
    /// `unit` must be positive.
    pub fn div_rem(self, unit: Money) -> (u64, Money) {
        if unit.0 <= 0 || self.0 <= 0 {
            return (0, self);
        }
        ((self.0 / unit.0) as u64, Money(self.0 % unit.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_unit = MINOR_PER_UNIT as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / per_unit,
            abs % per_unit,
            width = SCALE
        )
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (unsigned, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(MoneyError::Malformed(s.to_string()));
        }
        if fraction.len() > SCALE {
            // Trailing zeros beyond the scale carry no value, e.g. "1.500"
            if fraction[SCALE..].bytes().any(|b| b != b'0') {
                return Err(MoneyError::TooPrecise(s.to_string()));
            }
        }

        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyError::Overflow)?
        };
        let mut fraction_minor: i64 = 0;
        for i in 0..SCALE {
            let digit = fraction.as_bytes().get(i).map_or(0, |b| i64::from(b - b'0'));
            fraction_minor = fraction_minor * 10 + digit;
        }

        let minor = whole_units
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(fraction_minor))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money(if negative { -minor } else { minor }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two decimal places")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(MINOR_PER_UNIT)
            .map(Money)
            .ok_or_else(|| E::custom(MoneyError::Overflow))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(MoneyError::Overflow))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        // Shortest round-trip text of the float, e.g. 2.1 -> "2.1"
        if !v.is_finite() {
            return Err(E::custom(MoneyError::Malformed(v.to_string())));
        }
        v.to_string().parse().map_err(E::custom)
    }
}
