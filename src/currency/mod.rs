//! Currencies, exact monetary amounts and free-form amount parsing.

pub mod rates;

use std::{fmt, ops::Neg, str::FromStr};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

pub use rates::{ExchangeRateProvider, RateBook};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places used by the currency's minor unit.
    pub fn minor_units(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" | "CLP" | "ISK" => 0,
            "KWD" | "BHD" | "TND" | "OMR" | "JOD" => 3,
            _ => 2,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exact monetary value tagged with its currency.
///
/// Zero amounts carry no currency commitment: `0 USD == 0 EUR`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amount {
    pub value: Decimal,
    pub currency: Currency,
}

impl Amount {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self::new(self.value.abs(), self.currency.clone())
    }

    /// Same magnitude, different currency tag. No conversion happens.
    pub fn with_currency(&self, currency: Currency) -> Self {
        Self::new(self.value, currency)
    }

    /// Rounds to the currency's minor unit with banker's rounding.
    pub fn rounded(&self) -> Self {
        Self::new(
            round_to_minor_units(self.value, &self.currency),
            self.currency.clone(),
        )
    }

    /// Returns true when both amounts can be combined without a conversion.
    pub fn is_compatible(&self, other: &Amount) -> bool {
        self.currency == other.currency || self.is_zero() || other.is_zero()
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        if other.is_zero() {
            return Ok(self.clone());
        }
        if self.is_zero() {
            return Ok(Self::new(self.value + other.value, other.currency.clone()));
        }
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| LedgerError::InvalidAmount("addition overflow".into()))?;
        Ok(Self::new(value, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount> {
        self.checked_add(&-other.clone())
    }

    /// Converts into `target` using the rate valid at `date`, rounded half-to-even
    /// to the target's minor unit.
    pub fn convert_to(
        &self,
        target: &Currency,
        date: NaiveDate,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Amount> {
        if self.is_zero() {
            return Ok(Self::zero(target.clone()));
        }
        if &self.currency == target {
            return Ok(self.clone());
        }
        let rate = rates.rate(&self.currency, target, date)?;
        let value = self
            .value
            .checked_mul(rate)
            .ok_or_else(|| LedgerError::InvalidAmount("conversion overflow".into()))?;
        Ok(Self::new(round_to_minor_units(value, target), target.clone()))
    }

    /// Renders the amount the way split and transaction rows show it: the bare
    /// number for `native` amounts, prefixed by the currency code otherwise.
    pub fn format(&self, native: &Currency) -> String {
        let body = format_value(self.value, &self.currency);
        if &self.currency == native || self.is_zero() {
            body
        } else {
            format!("{} {}", self.currency, body)
        }
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        if self.is_zero() && other.is_zero() {
            return true;
        }
        self.value == other.value && self.currency == other.currency
    }
}

impl Eq for Amount {}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount::new(-self.value, self.currency)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.currency,
            format_value(self.value, &self.currency)
        )
    }
}

pub fn round_to_minor_units(value: Decimal, currency: &Currency) -> Decimal {
    value.round_dp_with_strategy(currency.minor_units(), RoundingStrategy::MidpointNearestEven)
}

fn format_value(value: Decimal, currency: &Currency) -> String {
    let mut rounded = round_to_minor_units(value, currency);
    rounded.rescale(currency.minor_units());
    rounded.to_string()
}

static AMOUNT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<lead>[a-z]{3})?\s*(?P<sign>[-+])?\s*(?P<open>\()?\s*(?P<num>\d[\d,]*(?:\.\d*)?|\.\d+)\s*(?P<close>\))?\s*(?P<trail>[a-z]{3})?$",
    )
    .expect("hardcoded amount pattern should be valid")
});

/// Parses a free-form amount such as `"12pln"`, `"-12"`, `"44 usd"` or
/// `"PLN 12.00"`.
///
/// The currency code is optional and defaults to `native`. Empty input is a zero
/// amount. The value keeps its sign and is rounded to the currency's minor unit.
pub fn parse_amount(text: &str, native: &Currency) -> Result<Amount> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Amount::zero(native.clone()));
    }
    let invalid = || LedgerError::InvalidAmount(trimmed.to_string());
    let caps = AMOUNT_PATTERN.captures(trimmed).ok_or_else(invalid)?;

    let currency = match (caps.name("lead"), caps.name("trail")) {
        (Some(_), Some(_)) => return Err(invalid()),
        (Some(code), None) | (None, Some(code)) => Currency::new(code.as_str()),
        (None, None) => native.clone(),
    };
    let parenthesized = match (caps.name("open"), caps.name("close")) {
        (Some(_), Some(_)) => true,
        (None, None) => false,
        _ => return Err(invalid()),
    };
    let negative = caps.name("sign").map(|m| m.as_str()) == Some("-");

    let digits = caps["num"].replace(',', "");
    let digits = digits.trim_end_matches('.');
    let mut value = Decimal::from_str(digits).map_err(|_| invalid())?;
    if negative != parenthesized {
        value = -value;
    }
    Ok(Amount::new(round_to_minor_units(value, &currency), currency))
}
