use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// Signed money amount in integer minor units (cents).
///
/// Every amount handled by the settlement code goes through this type so
/// splitting and summing stay exact. It carries no currency, and only offers
/// checked arithmetic.
///
/// ```rust
/// use settleup::Cents;
///
/// let amount: Cents = "12,5".parse().unwrap();
/// assert_eq!(amount.cents(), 1250);
/// assert_eq!(amount.to_string(), "12.50");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `None` for `i64::MIN`, whose magnitude does not fit.
    #[must_use]
    pub const fn checked_abs(self) -> Option<Cents> {
        match self.0.checked_abs() {
            Some(abs) => Some(Cents(abs)),
            None => None,
        }
    }

    #[must_use]
    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }

    #[must_use]
    pub fn checked_sub(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_sub(rhs.0).map(Cents)
    }

    /// Splits a non-negative amount into `parts` shares that add up to it
    /// exactly.
    ///
    /// Every share is `self / parts`; the `self % parts` leftover cents go
    /// one each to the first shares. Returns `None` for `parts == 0` or a
    /// negative amount.
    ///
    /// ```rust
    /// use settleup::Cents;
    ///
    /// let shares = Cents::new(100).split_evenly(3).unwrap();
    /// assert_eq!(shares, vec![Cents::new(34), Cents::new(33), Cents::new(33)]);
    /// ```
    #[must_use]
    pub fn split_evenly(self, parts: usize) -> Option<Vec<Cents>> {
        if parts == 0 || self.is_negative() {
            return None;
        }
        let parts_i64 = i64::try_from(parts).ok()?;
        let base = self.0 / parts_i64;
        let leftover = usize::try_from(self.0 % parts_i64).ok()?;
        Some(
            (0..parts)
                .map(|i| Cents(if i < leftover { base + 1 } else { base }))
                .collect(),
        )
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Cents> for i64 {
    fn from(value: Cents) -> Self {
        value.0
    }
}

impl FromStr for Cents {
    type Err = SplitError;

    /// Parses decimal text such as `12`, `12.3`, `-0,05`.
    ///
    /// At most two fractional digits are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SplitError::InvalidAmount(format!("{reason}: {s:?}"));

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        if rest.is_empty() {
            return Err(invalid("empty amount"));
        }

        let rest = rest.replace(',', ".");
        let (units, fraction) = match rest.split_once('.') {
            Some((units, fraction)) => (units, fraction),
            None => (rest.as_str(), ""),
        };
        if units.is_empty()
            || !units.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("invalid amount"));
        }

        let units: i64 = units.parse().map_err(|_| invalid("amount too large"))?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("invalid amount"))? * 10,
            2 => fraction.parse().map_err(|_| invalid("invalid amount"))?,
            _ => return Err(invalid("too many decimals")),
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Cents(if negative { -total } else { total }))
    }
}
