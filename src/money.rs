//! Exact decimal amounts of money.

use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The number of decimal places money is stored with.
const MONEY_DECIMAL_PLACES: u32 = 2;

/// The largest magnitude accepted for an amount, one trillion.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// An amount of money, e.g. `-45.99`.
///
/// Amounts are exact decimals rounded to cents. They are stored in the
/// database as text and serialized as decimal strings so that no precision is
/// lost to floating point on the way in or out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create an amount from a decimal, rounding to cents.
    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(MONEY_DECIMAL_PLACES))
    }

    /// Create an amount from a whole number of cents, e.g. `-4599` for `-45.99`.
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_DECIMAL_PLACES))
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// The magnitude of the amount.
    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Whether the amount is strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = Error;

    /// Round `value` to cents.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if the magnitude of `value` is larger
    /// than [MAX_AMOUNT].
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.abs() > MAX_AMOUNT {
            return Err(Error::Validation(format!(
                "{value} is larger than the maximum amount of {MAX_AMOUNT}"
            )));
        }

        Ok(Money::from_decimal(value))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse an amount such as `"12.30"` or `"-7"`.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if `s` is not a decimal number or is
    /// larger than [MAX_AMOUNT].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map_err(|_| Error::Validation(format!("\"{s}\" is not a valid amount of money")))
            .and_then(Money::try_from)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |total, amount| total + amount)
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(_) => value
                .as_str()?
                .parse::<Decimal>()
                .map(Money::from_decimal)
                .map_err(|error| FromSqlError::Other(Box::new(error))),
            ValueRef::Integer(integer) => Ok(Money(Decimal::from(integer))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
