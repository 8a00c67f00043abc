use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("`{input}` is not a decimal number")]
    Unparsable { input: String },
    #[error("amount must not be negative, got {0}")]
    Negative(Decimal),
    #[error("amount must be a positive number, got {0}")]
    NotPositive(Decimal),
    #[error("`{input}` is not a finite exchange rate")]
    InvalidRate { input: String },
    #[error("exchange rate {0} cannot be applied to an exact amount")]
    UnrepresentableRate(f64),
    #[error("arithmetic overflow")]
    Overflow,
}

/// Exact decimal amount. Balances and transfer amounts never touch binary
/// floating point; only [`ExchangeRate`] does, at conversion time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Parses any decimal, including negative ones.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        Decimal::from_str(input.trim())
            .map(Self)
            .map_err(|_| MoneyError::Unparsable {
                input: input.to_string(),
            })
    }

    pub fn parse_non_negative(input: &str) -> Result<Self, MoneyError> {
        let money = Self::parse(input)?;
        if money.is_negative() {
            return Err(MoneyError::Negative(money.0));
        }
        Ok(money)
    }

    pub fn parse_positive(input: &str) -> Result<Self, MoneyError> {
        let money = Self::parse(input)?;
        if !money.is_positive() {
            return Err(MoneyError::NotPositive(money.0));
        }
        Ok(money)
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(|sum| Money(sum.normalize()))
            .ok_or(MoneyError::Overflow)
    }

    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(|diff| Money(diff.normalize()))
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by `rate`. The rate is taken at its shortest decimal
    /// representation, so `1.2` converts as exactly `1.2`.
    pub fn convert(self, rate: ExchangeRate) -> Result<Money, MoneyError> {
        let factor =
            Decimal::from_f64(rate.0).ok_or(MoneyError::UnrepresentableRate(rate.0))?;
        self.0
            .checked_mul(factor)
            .map(|product| Money(product.normalize()))
            .ok_or(MoneyError::Overflow)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directional conversion factor between two currencies.
///
/// Any finite value is accepted, including zero and negative ones; such
/// rates are only rejected once they produce an invalid credit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(f64);

impl ExchangeRate {
    pub const ONE: ExchangeRate = ExchangeRate(1.0);

    pub fn new(rate: f64) -> Result<Self, MoneyError> {
        if rate.is_finite() {
            Ok(Self(rate))
        } else {
            Err(MoneyError::InvalidRate {
                input: rate.to_string(),
            })
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl FromStr for ExchangeRate {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate: f64 = s.trim().parse().map_err(|_| MoneyError::InvalidRate {
            input: s.to_string(),
        })?;
        Self::new(rate).map_err(|_| MoneyError::InvalidRate {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency code such as `USD`. Must be non-empty and must not contain `:`,
/// which separates the two halves of an exchange pair key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() {
            return Err("currency code must not be empty".to_string());
        }
        if code.contains(':') {
            return Err(format!("currency code `{code}` must not contain `:`"));
        }
        Ok(Self(code.to_string()))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;

    use super::*;

    fn money(value: u32) -> Money {
        Money::new(Decimal::from_u32(value).unwrap())
    }

    #[test]
    fn parse_amounts() {
        assert_eq!(Money::parse("400").unwrap(), money(400));
        assert_eq!(Money::parse(" 12.50 ").unwrap().to_string(), "12.50");
        assert!(matches!(
            Money::parse("12,5").unwrap_err(),
            MoneyError::Unparsable { .. }
        ));
        assert!(matches!(
            Money::parse_non_negative("-1").unwrap_err(),
            MoneyError::Negative(_)
        ));
        assert_eq!(Money::parse_non_negative("0").unwrap(), Money::ZERO);
        assert!(matches!(
            Money::parse_positive("0").unwrap_err(),
            MoneyError::NotPositive(_)
        ));
        assert!(matches!(
            Money::parse_positive("-3").unwrap_err(),
            MoneyError::NotPositive(_)
        ));
    }

    #[test]
    fn arithmetic_stays_exact() {
        let a = Money::parse("0.1").unwrap();
        let b = Money::parse("0.2").unwrap();
        assert_eq!(a.checked_add(b).unwrap(), Money::parse("0.3").unwrap());
        assert_eq!(money(100).checked_sub(money(10)).unwrap(), money(90));
        assert_eq!(money(100).checked_sub(money(10)).unwrap().to_string(), "90");
    }

    #[test]
    fn convert_with_rate() {
        let rate: ExchangeRate = "1.20".parse().unwrap();
        let credited = money(10).convert(rate).unwrap();
        assert_eq!(credited, money(12));
        assert_eq!(credited.to_string(), "12");
        assert_eq!(money(1000).convert(ExchangeRate::ONE).unwrap(), money(1000));

        let rate: ExchangeRate = "0.8".parse().unwrap();
        assert_eq!(
            money(10).convert(rate).unwrap(),
            Money::parse("8").unwrap()
        );
    }

    #[test]
    fn overflow_is_reported() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(money(1)).unwrap_err(), MoneyError::Overflow);
        let rate = ExchangeRate::new(2.0).unwrap();
        assert_eq!(max.convert(rate).unwrap_err(), MoneyError::Overflow);
    }

    #[test]
    fn rate_beyond_decimal_range() {
        let rate = ExchangeRate::new(1e30).unwrap();
        assert_eq!(
            money(1).convert(rate).unwrap_err(),
            MoneyError::UnrepresentableRate(1e30)
        );
    }

    #[test]
    fn rates_must_be_finite() {
        assert!("NaN".parse::<ExchangeRate>().is_err());
        assert!("inf".parse::<ExchangeRate>().is_err());
        assert!("abc".parse::<ExchangeRate>().is_err());
        // non-positive rates are accepted
        assert_eq!("0".parse::<ExchangeRate>().unwrap().value(), 0.0);
        assert_eq!("-1.5".parse::<ExchangeRate>().unwrap().value(), -1.5);
    }

    #[test]
    fn currency_codes() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap().as_str(), "USD");
        assert!("".parse::<CurrencyCode>().is_err());
        assert!("US:D".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::parse("12.5").unwrap()).unwrap();
        assert_eq!(json, "\"12.5\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::parse("12.5").unwrap());
    }
}
