use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::currency::{round_to_minor_units, Amount, Currency, ExchangeRateProvider};
use crate::errors::Result;

/// One leg of a transaction. `account == None` marks an unassigned split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Split {
    pub id: Uuid,
    pub account: Option<Uuid>,
    pub amount: Amount,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub reconciled: bool,
}

impl Split {
    pub fn new(account: Option<Uuid>, amount: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            amount,
            memo: String::new(),
            reconciled: false,
        }
    }

    pub fn unassigned(amount: Amount) -> Self {
        Self::new(None, amount)
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn is_unassigned(&self) -> bool {
        self.account.is_none()
    }

    /// Positive amounts are debits.
    pub fn debit(&self) -> Option<Amount> {
        self.amount.is_positive().then(|| self.amount.clone())
    }

    /// Negative amounts are credits, reported as a positive magnitude.
    pub fn credit(&self) -> Option<Amount> {
        self.amount.is_negative().then(|| self.amount.abs())
    }

    fn same_content(&self, other: &Split) -> bool {
        self.account == other.account
            && self.amount.value == other.amount.value
            && (self.amount.is_zero() || self.amount.currency == other.amount.currency)
            && self.memo == other.memo
            && self.reconciled == other.reconciled
    }
}

/// Classification of a transaction's split layout, recomputed on every edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionShape {
    /// No splits at all.
    Empty,
    /// The classic from/to shape: at most the two main splits.
    Simple,
    /// More than two splits.
    MultiSplit,
}

impl TransactionShape {
    pub fn classify(splits: &[Split]) -> Self {
        match splits.len() {
            0 => Self::Empty,
            1 | 2 => Self::Simple,
            _ => Self::MultiSplit,
        }
    }
}

/// Number of leading splits that form the from/to pair.
pub const MAIN_SPLIT_COUNT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub checkno: String,
    #[serde(default)]
    pub notes: String,
    /// Explicit native currency. When absent, the first split's currency is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub(crate) splits: Vec<Split>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            description: description.into(),
            payee: String::new(),
            checkno: String::new(),
            notes: String::new(),
            currency: None,
            splits: Vec::new(),
        }
    }

    /// Builds a transaction from explicit splits. The result is only guaranteed to
    /// balance once it has gone through the ledger or the balancer.
    pub fn with_splits(
        date: NaiveDate,
        description: impl Into<String>,
        splits: Vec<Split>,
    ) -> Self {
        let mut txn = Self::new(date, description);
        txn.splits = splits;
        txn
    }

    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = payee.into();
        self
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn split(&self, id: Uuid) -> Option<&Split> {
        self.splits.iter().find(|split| split.id == id)
    }

    pub fn split_index(&self, id: Uuid) -> Option<usize> {
        self.splits.iter().position(|split| split.id == id)
    }

    pub fn main_splits(&self) -> &[Split] {
        let end = self.splits.len().min(MAIN_SPLIT_COUNT);
        &self.splits[..end]
    }

    pub fn shape(&self) -> TransactionShape {
        TransactionShape::classify(&self.splits)
    }

    pub fn accounts(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.splits.iter().filter_map(|split| split.account)
    }

    pub fn references_account(&self, account: Uuid) -> bool {
        self.accounts().any(|id| id == account)
    }

    pub fn has_reconciled_split(&self) -> bool {
        self.splits.iter().any(|split| split.reconciled)
    }

    pub fn reference_currency(&self, native: &Currency) -> Currency {
        if let Some(currency) = &self.currency {
            return currency.clone();
        }
        self.splits
            .first()
            .map(|split| split.amount.currency.clone())
            .unwrap_or_else(|| native.clone())
    }

    /// True when at least one non-zero split is not in the reference currency.
    pub fn is_multi_currency(&self, native: &Currency) -> bool {
        let reference = self.reference_currency(native);
        self.splits
            .iter()
            .any(|split| !split.amount.is_zero() && split.amount.currency != reference)
    }

    /// Sum of all splits converted to the reference currency at the transaction date.
    pub fn imbalance(
        &self,
        native: &Currency,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Amount> {
        let reference = self.reference_currency(native);
        let mut total = Amount::zero(reference.clone());
        for split in &self.splits {
            let converted = split.amount.convert_to(&reference, self.date, rates)?;
            total = total.checked_add(&converted)?;
        }
        Ok(Amount::new(total.value, reference))
    }

    pub fn is_balanced(&self, native: &Currency, rates: &dyn ExchangeRateProvider) -> Result<bool> {
        Ok(self.imbalance(native, rates)?.is_zero())
    }

    /// The amount shown for the transaction as a whole.
    ///
    /// Single-currency transactions show the sum of their debits, leaving out
    /// unassigned splits past the main pair: those only hold an imbalance.
    /// Multi-currency transactions show the average of the absolute converted
    /// values of the two main splits.
    pub fn amount(&self, native: &Currency, rates: &dyn ExchangeRateProvider) -> Result<Amount> {
        let reference = self.reference_currency(native);
        if self.splits.is_empty() {
            return Ok(Amount::zero(reference));
        }
        if !self.is_multi_currency(native) {
            let debits: Decimal = self
                .splits
                .iter()
                .enumerate()
                .filter(|(index, split)| *index < MAIN_SPLIT_COUNT || !split.is_unassigned())
                .filter(|(_, split)| split.amount.is_positive())
                .map(|(_, split)| split.amount.value)
                .sum();
            return Ok(Amount::new(debits, reference));
        }
        let mut total = Decimal::ZERO;
        for split in self.main_splits() {
            let converted = split.amount.convert_to(&reference, self.date, rates)?;
            total += converted.value.abs();
        }
        let average = round_to_minor_units(total / Decimal::TWO, &reference);
        Ok(Amount::new(average, reference))
    }

    /// Compares everything a user can see, ignoring identifiers.
    pub fn same_content(&self, other: &Transaction) -> bool {
        self.date == other.date
            && self.description == other.description
            && self.payee == other.payee
            && self.checkno == other.checkno
            && self.notes == other.notes
            && self.currency == other.currency
            && self.splits.len() == other.splits.len()
            && self
                .splits
                .iter()
                .zip(&other.splits)
                .all(|(a, b)| a.same_content(b))
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} splits)",
            self.date.format("%Y-%m-%d"),
            self.description,
            self.splits.len()
        )
    }
}
