//! Turns flat imported rows (bank exports, QIF-like records) into ledger
//! transactions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::{parse_amount, Amount, Currency, ExchangeRateProvider};
use crate::errors::{LedgerError, Result};
use crate::ledger::{AccountKind, Ledger, Split, Transaction};

/// One imported row. `amount` is free text and positive when money enters
/// `account`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRecord {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payee: String,
    #[serde(default)]
    pub checkno: String,
    pub amount: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub transfer: Option<String>,
    #[serde(default)]
    pub memo: String,
}

/// Outcome of a batch import.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<Uuid>,
    pub rejected: Vec<(usize, LedgerError)>,
}

pub struct ImportService;

impl ImportService {
    /// Imports one record, creating missing accounts by name. The record's
    /// account gets an asset account; the transfer side becomes income or
    /// expense depending on the direction of the money.
    pub fn import_record(
        ledger: &mut Ledger,
        record: ImportRecord,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        let date = record
            .date
            .ok_or_else(|| LedgerError::InvalidInput("imported record has no date".into()))?;
        let native = record
            .account
            .as_deref()
            .and_then(|name| ledger.account_by_name(name))
            .map(|account| account.currency.clone())
            .unwrap_or_else(|| ledger.native_currency.clone());
        let amount = parse_amount(&record.amount, &native)?;

        let mut created = Vec::new();
        let result = Self::store_record(ledger, date, record, amount, &mut created, rates);
        let id = match result {
            Ok(id) => id,
            Err(err) => {
                ledger.forget_accounts(&created);
                return Err(err);
            }
        };
        tracing::debug!(transaction = %id, "record imported");
        Ok(id)
    }

    fn store_record(
        ledger: &mut Ledger,
        date: NaiveDate,
        record: ImportRecord,
        amount: Amount,
        created: &mut Vec<Uuid>,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        let transfer_kind = if amount.is_negative() {
            AccountKind::Expense
        } else {
            AccountKind::Income
        };
        let account = match record.account.as_deref() {
            Some(name) => Some(find_or_create(
                ledger,
                name,
                AccountKind::Asset,
                &amount.currency,
                created,
            )?),
            None => None,
        };
        let transfer = match record.transfer.as_deref() {
            Some(name) => Some(find_or_create(
                ledger,
                name,
                transfer_kind,
                &amount.currency,
                created,
            )?),
            None => None,
        };
        let (from, to) = if amount.is_negative() {
            (account, transfer)
        } else {
            (transfer, account)
        };
        let amount = amount.abs();
        let mut txn = Transaction::with_splits(
            date,
            record.description,
            vec![
                Split::new(from, -amount.clone()).with_memo(record.memo),
                Split::new(to, amount),
            ],
        );
        txn.payee = record.payee;
        txn.checkno = record.checkno;
        ledger.insert_transaction(txn, rates)
    }

    /// Imports records one at a time. A rejected record does not stop the
    /// batch and leaves no trace in the ledger.
    pub fn import_all<I>(
        ledger: &mut Ledger,
        records: I,
        rates: &dyn ExchangeRateProvider,
    ) -> ImportSummary
    where
        I: IntoIterator<Item = ImportRecord>,
    {
        let mut summary = ImportSummary::default();
        for (index, record) in records.into_iter().enumerate() {
            match Self::import_record(ledger, record, rates) {
                Ok(id) => summary.imported.push(id),
                Err(err) => {
                    tracing::warn!(row = index, error = %err, "import record rejected");
                    summary.rejected.push((index, err));
                }
            }
        }
        tracing::info!(
            imported = summary.imported.len(),
            rejected = summary.rejected.len(),
            "import finished"
        );
        summary
    }
}

fn find_or_create(
    ledger: &mut Ledger,
    name: &str,
    kind: AccountKind,
    currency: &Currency,
    created: &mut Vec<Uuid>,
) -> Result<Uuid> {
    if let Some(account) = ledger.account_by_name(name) {
        return Ok(account.id);
    }
    let id = ledger.add_account(name, kind, Some(currency.clone()))?;
    created.push(id);
    Ok(id)
}
