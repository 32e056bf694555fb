#![allow(dead_code)]

use std::sync::Mutex;

use chrono::NaiveDate;
use ledger_core::{
    currency::{parse_amount, Amount, Currency, RateBook},
    ledger::{AccountKind, Ledger, NewTransaction, Split, Transaction},
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn temp_path(file: &str) -> std::path::PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().join(file);
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn usd(text: &str) -> Amount {
    parse_amount(text, &Currency::new("USD")).expect("valid amount")
}

/// Ledger in USD with three expense-style accounts and a rate table where one
/// CAD buys 1.25 USD.
pub struct Fixture {
    pub ledger: Ledger,
    pub rates: RateBook,
    pub foo: Uuid,
    pub bar: Uuid,
    pub baz: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let mut ledger = Ledger::new("Test", Currency::new("USD"));
        let foo = ledger
            .add_account("foo", AccountKind::Asset, None)
            .expect("add foo");
        let bar = ledger
            .add_account("bar", AccountKind::Expense, None)
            .expect("add bar");
        let baz = ledger
            .add_account("baz", AccountKind::Expense, None)
            .expect("add baz");
        let mut rates = RateBook::with_fallback_days(10_000);
        rates.set_rate(
            Currency::new("CAD"),
            Currency::new("USD"),
            date(2008, 1, 1),
            Decimal::new(125, 2),
        );
        ledger.take_events();
        Self {
            ledger,
            rates,
            foo,
            bar,
            baz,
        }
    }

    /// `foo` credited and `bar` debited by `value` USD on 2010-02-20.
    pub fn simple(&mut self, value: &str) -> Uuid {
        let draft = NewTransaction::new(date(2010, 2, 20), "simple", usd(value))
            .from_account(self.foo)
            .to_account(self.bar);
        self.ledger
            .new_transaction(draft, &self.rates)
            .expect("simple transaction")
    }

    /// foo -42, bar +37, baz +5.
    pub fn three_way(&mut self) -> Uuid {
        let txn = Transaction::with_splits(
            date(2010, 2, 20),
            "three way",
            vec![
                Split::new(Some(self.foo), usd("-42")),
                Split::new(Some(self.bar), usd("37")),
                Split::new(Some(self.baz), usd("5")),
            ],
        );
        self.ledger
            .insert_transaction(txn, &self.rates)
            .expect("three way transaction")
    }

    pub fn txn(&self, id: Uuid) -> &Transaction {
        self.ledger.transaction(id).expect("transaction exists")
    }

    pub fn split_id(&self, id: Uuid, index: usize) -> Uuid {
        self.txn(id).splits()[index].id
    }

    pub fn values(&self, id: Uuid) -> Vec<(Option<Uuid>, Amount)> {
        self.txn(id)
            .splits()
            .iter()
            .map(|split| (split.account, split.amount.clone()))
            .collect()
    }

    pub fn displayed_amount(&self, id: Uuid) -> String {
        let native = self.ledger.native_currency.clone();
        self.txn(id)
            .amount(&native, &self.rates)
            .expect("displayed amount")
            .format(&native)
    }

    pub fn assert_balanced(&self) {
        self.ledger
            .check_consistency(&self.rates)
            .expect("ledger is consistent");
    }
}
