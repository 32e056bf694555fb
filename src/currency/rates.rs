use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Currency;
use crate::errors::{LedgerError, Result};

/// Resolves a conversion rate for a currency pair at a given date.
///
/// `rate(from, to, date)` is the number of `to` units one `from` unit buys.
pub trait ExchangeRateProvider {
    fn rate(&self, from: &Currency, to: &Currency, date: NaiveDate) -> Result<Decimal>;
}

/// A single published rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FxRate {
    pub from: Currency,
    pub to: Currency,
    pub date: NaiveDate,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl FxRate {
    pub fn new(from: Currency, to: Currency, date: NaiveDate, rate: Decimal) -> Self {
        Self {
            from,
            to,
            date,
            rate,
            source: None,
        }
    }
}

/// In-memory rate table with inverse-pair lookup and a nearest-earlier fallback.
#[derive(Debug, Clone)]
pub struct RateBook {
    rates: BTreeMap<(Currency, Currency), BTreeMap<NaiveDate, Decimal>>,
    /// How many days back a missing rate may be taken from. Zero disables the
    /// fallback entirely.
    pub fallback_days: i64,
}

pub const DEFAULT_FALLBACK_DAYS: i64 = 30;

impl RateBook {
    pub fn new() -> Self {
        Self::with_fallback_days(DEFAULT_FALLBACK_DAYS)
    }

    pub fn with_fallback_days(fallback_days: i64) -> Self {
        Self {
            rates: BTreeMap::new(),
            fallback_days,
        }
    }

    pub fn add_rate(&mut self, rate: FxRate) {
        self.set_rate(rate.from, rate.to, rate.date, rate.rate);
    }

    pub fn set_rate(&mut self, from: Currency, to: Currency, date: NaiveDate, rate: Decimal) {
        self.rates.entry((from, to)).or_default().insert(date, rate);
    }

    pub fn remove_rate(&mut self, from: &Currency, to: &Currency, date: NaiveDate) {
        for key in [
            (from.clone(), to.clone()),
            (to.clone(), from.clone()),
        ] {
            if let Some(series) = self.rates.get_mut(&key) {
                series.remove(&date);
            }
        }
    }

    pub fn all_rates(&self) -> Vec<FxRate> {
        let mut out: Vec<FxRate> = self
            .rates
            .iter()
            .flat_map(|((from, to), series)| {
                series
                    .iter()
                    .map(|(date, rate)| FxRate::new(from.clone(), to.clone(), *date, *rate))
            })
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date));
        out
    }

    fn lookup_within(
        &self,
        series: &BTreeMap<NaiveDate, Decimal>,
        date: NaiveDate,
    ) -> Option<Decimal> {
        if let Some(rate) = series.get(&date) {
            return Some(*rate);
        }
        if self.fallback_days <= 0 {
            return None;
        }
        let (near_date, rate) = series.range(..=date).next_back()?;
        if (date - *near_date).num_days() <= self.fallback_days {
            tracing::debug!(%near_date, %date, "using nearest earlier exchange rate");
            Some(*rate)
        } else {
            None
        }
    }
}

impl Default for RateBook {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRateProvider for RateBook {
    fn rate(&self, from: &Currency, to: &Currency, date: NaiveDate) -> Result<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let unavailable = || LedgerError::RateUnavailable {
            from: from.clone(),
            to: to.clone(),
            date,
        };
        if let Some(series) = self.rates.get(&(from.clone(), to.clone())) {
            if let Some(rate) = self.lookup_within(series, date) {
                return Ok(rate);
            }
        }
        if let Some(series) = self.rates.get(&(to.clone(), from.clone())) {
            if let Some(rate) = self.lookup_within(series, date) {
                if rate.is_zero() {
                    return Err(unavailable());
                }
                return Decimal::ONE.checked_div(rate).ok_or_else(unavailable);
            }
        }
        Err(unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn lookup_uses_nearest_prior_within_window() {
        let mut book = RateBook::with_fallback_days(3);
        book.set_rate(Currency::new("EUR"), Currency::new("USD"), day(10), dec!(1.1));
        let rate = book
            .rate(&Currency::new("EUR"), &Currency::new("USD"), day(12))
            .unwrap();
        assert_eq!(rate, dec!(1.1));
        assert!(book
            .rate(&Currency::new("EUR"), &Currency::new("USD"), day(20))
            .is_err());
        assert!(book
            .rate(&Currency::new("EUR"), &Currency::new("USD"), day(9))
            .is_err());
    }

    #[test]
    fn inverse_pair_is_used() {
        let mut book = RateBook::new();
        book.set_rate(Currency::new("USD"), Currency::new("CAD"), day(1), dec!(0.8));
        let rate = book
            .rate(&Currency::new("CAD"), &Currency::new("USD"), day(1))
            .unwrap();
        assert_eq!(rate, dec!(1.25));
    }

    #[test]
    fn zero_fallback_requires_exact_date() {
        let mut book = RateBook::with_fallback_days(0);
        book.set_rate(Currency::new("EUR"), Currency::new("USD"), day(10), dec!(1.1));
        assert!(book
            .rate(&Currency::new("EUR"), &Currency::new("USD"), day(11))
            .is_err());
        assert_eq!(
            book.rate(&Currency::new("USD"), &Currency::new("USD"), day(11))
                .unwrap(),
            Decimal::ONE
        );
    }

    #[test]
    fn removed_rates_are_gone_both_ways() {
        let mut book = RateBook::new();
        book.set_rate(Currency::new("EUR"), Currency::new("USD"), day(10), dec!(1.1));
        book.remove_rate(&Currency::new("USD"), &Currency::new("EUR"), day(10));
        assert!(book.all_rates().is_empty());
    }
}
