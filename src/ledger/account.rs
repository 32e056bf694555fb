use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::currency::Currency;

pub const IMBALANCE_ACCOUNT_NAME: &str = "Imbalance";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Asset,
    Liability,
    Income,
    Expense,
}

impl AccountKind {
    /// Balance-sheet accounts carry a running balance; income/expense accounts
    /// only accumulate flows over a period.
    pub fn is_balance_sheet(&self) -> bool {
        matches!(self, Self::Asset | Self::Liability)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Asset => "Asset",
            Self::Liability => "Liability",
            Self::Income => "Income",
            Self::Expense => "Expense",
        };
        f.write_str(label)
    }
}

/// Back-reference from an account to one split of one transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntryRef {
    pub transaction_id: Uuid,
    pub split_id: Uuid,
}

/// A named ledger target. `entries` is maintained by the ledger only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    pub currency: Currency,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub(crate) entries: Vec<EntryRef>,
}

impl Account {
    pub fn new(name: impl Into<String>, kind: AccountKind, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            currency,
            notes: String::new(),
            reserved: false,
            entries: Vec::new(),
        }
    }

    pub(crate) fn imbalance(currency: Currency) -> Self {
        let mut account = Self::new(IMBALANCE_ACCOUNT_NAME, AccountKind::Asset, currency);
        account.reserved = true;
        account
    }

    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn is_referenced(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_no_entries() {
        let account = Account::new("Checking", AccountKind::Asset, Currency::default());
        assert!(!account.is_referenced());
        assert!(!account.reserved);
        assert_eq!(account.to_string(), "Checking (Asset)");
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let account = Account::new("Groceries", AccountKind::Expense, Currency::default());
        assert!(account.name_matches(" groceries "));
        assert!(!account.name_matches("grocery"));
    }

    #[test]
    fn imbalance_account_is_reserved() {
        let account = Account::imbalance(Currency::new("EUR"));
        assert!(account.reserved);
        assert_eq!(account.name, IMBALANCE_ACCOUNT_NAME);
        assert!(account.kind.is_balance_sheet());
    }
}
