//! Typed field access for split and transaction rows.
//!
//! Reads return a [`FieldValue`]; writes go through the balancer so a row
//! editor can never leave a transaction unbalanced.

use chrono::NaiveDate;
use uuid::Uuid;

use super::balancer::TransactionBalancer;
use super::transaction::{Split, Transaction};
use crate::currency::{parse_amount, Amount, Currency};
use crate::errors::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitField {
    Account,
    Memo,
    Debit,
    Credit,
    Reconciled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionField {
    Date,
    Description,
    Payee,
    Checkno,
    Notes,
    Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Date(NaiveDate),
    Amount(Amount),
    Account(Option<Uuid>),
    Flag(bool),
}

impl FieldValue {
    /// Row rendering. Amounts in `native` show without a currency code.
    pub fn display(&self, native: &Currency) -> String {
        match self {
            Self::Empty | Self::Account(None) => String::new(),
            Self::Text(text) => text.clone(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Amount(amount) => amount.format(native),
            Self::Account(Some(id)) => id.to_string(),
            Self::Flag(flag) => if *flag { "x" } else { "" }.to_string(),
        }
    }

    fn into_text(self, field: &str) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Empty => Ok(String::new()),
            other => Err(mismatch(field, &other)),
        }
    }

    /// Accepts either a typed amount or free text such as `"12pln"`.
    fn into_amount(self, field: &str, native: &Currency) -> Result<Amount> {
        match self {
            Self::Amount(amount) => Ok(amount),
            Self::Text(text) => parse_amount(&text, native),
            Self::Empty => Ok(Amount::zero(native.clone())),
            other => Err(mismatch(field, &other)),
        }
    }
}

fn mismatch(field: &str, value: &FieldValue) -> LedgerError {
    LedgerError::InvalidInput(format!("{field} cannot take {value:?}"))
}

pub fn split_field(split: &Split, field: SplitField) -> FieldValue {
    match field {
        SplitField::Account => FieldValue::Account(split.account),
        SplitField::Memo => FieldValue::Text(split.memo.clone()),
        SplitField::Debit => split.debit().map_or(FieldValue::Empty, FieldValue::Amount),
        SplitField::Credit => split.credit().map_or(FieldValue::Empty, FieldValue::Amount),
        SplitField::Reconciled => FieldValue::Flag(split.reconciled),
    }
}

pub fn transaction_field(
    txn: &Transaction,
    field: TransactionField,
    balancer: &TransactionBalancer<'_>,
) -> Result<FieldValue> {
    Ok(match field {
        TransactionField::Date => FieldValue::Date(txn.date),
        TransactionField::Description => FieldValue::Text(txn.description.clone()),
        TransactionField::Payee => FieldValue::Text(txn.payee.clone()),
        TransactionField::Checkno => FieldValue::Text(txn.checkno.clone()),
        TransactionField::Notes => FieldValue::Text(txn.notes.clone()),
        TransactionField::Amount => FieldValue::Amount(balancer.displayed_amount(txn)?),
    })
}

pub fn set_split_field(
    balancer: &TransactionBalancer<'_>,
    txn: &mut Transaction,
    split_id: Uuid,
    field: SplitField,
    value: FieldValue,
) -> Result<()> {
    let native = txn.reference_currency(balancer.native());
    match field {
        SplitField::Account => match value {
            FieldValue::Account(account) => balancer.assign_account(txn, split_id, account),
            FieldValue::Empty => balancer.assign_account(txn, split_id, None),
            other => Err(mismatch("account", &other)),
        },
        SplitField::Memo => {
            let memo = value.into_text("memo")?;
            balancer.set_memo(txn, split_id, memo)
        }
        SplitField::Debit => {
            let amount = value.into_amount("debit", &native)?;
            balancer.set_split_debit(txn, split_id, amount)
        }
        SplitField::Credit => {
            let amount = value.into_amount("credit", &native)?;
            balancer.set_split_credit(txn, split_id, amount)
        }
        SplitField::Reconciled => match value {
            FieldValue::Flag(flag) => balancer.set_reconciled(txn, split_id, flag),
            other => Err(mismatch("reconciled", &other)),
        },
    }
}

pub fn set_transaction_field(
    balancer: &TransactionBalancer<'_>,
    txn: &mut Transaction,
    field: TransactionField,
    value: FieldValue,
) -> Result<()> {
    match field {
        TransactionField::Date => match value {
            FieldValue::Date(date) => {
                let mut work = txn.clone();
                work.date = date;
                // Conversion rates depend on the date.
                balancer.balance(&mut work)?;
                *txn = work;
                Ok(())
            }
            other => Err(mismatch("date", &other)),
        },
        TransactionField::Description => {
            txn.description = value.into_text("description")?;
            Ok(())
        }
        TransactionField::Payee => {
            txn.payee = value.into_text("payee")?;
            Ok(())
        }
        TransactionField::Checkno => {
            txn.checkno = value.into_text("checkno")?;
            Ok(())
        }
        TransactionField::Notes => {
            txn.notes = value.into_text("notes")?;
            Ok(())
        }
        TransactionField::Amount => {
            let native = txn.reference_currency(balancer.native());
            let amount = value.into_amount("amount", &native)?;
            balancer.set_amount(txn, amount)
        }
    }
}
