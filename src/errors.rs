use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::currency::Currency;

/// Error type that captures ledger, balancing and recurrence failures.
///
/// Every variant is recoverable: an operation that returns an error leaves the
/// ledger exactly as it was before the call.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Currency mismatch: cannot combine {left} with {right}")]
    CurrencyMismatch { left: Currency, right: Currency },
    #[error("No exchange rate {from} → {to} on {date}")]
    RateUnavailable {
        from: Currency,
        to: Currency,
        date: NaiveDate,
    },
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),
    #[error("Split {0} is reconciled; unreconcile it before editing")]
    ReconciledSplitLocked(Uuid),
    #[error("Account `{name}` is referenced by {references} split(s)")]
    AccountInUse { name: String, references: usize },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("Split not found: {0}")]
    SplitNotFound(String),
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(Uuid),
    #[error("Budget not found: {0}")]
    BudgetNotFound(Uuid),
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Inconsistent ledger: {0}")]
    Inconsistent(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::ReconciledSplitLocked(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
