mod common;

use common::{date, usd, Fixture};
use ledger_core::currency::{Amount, Currency};
use ledger_core::ledger::{
    FieldValue, NewTransaction, Split, SplitField, Transaction, TransactionField, TransactionShape,
};
use ledger_core::LedgerError;

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

#[test]
fn amountless_transaction_takes_amount_from_credit() {
    let mut fx = Fixture::new();
    let id = fx
        .ledger
        .new_transaction(NewTransaction::new(date(2010, 2, 20), "", usd("0")), &fx.rates)
        .unwrap();
    assert_eq!(fx.txn(id).splits().len(), 2);
    let first = fx.split_id(id, 0);
    fx.ledger
        .set_split_field(id, first, SplitField::Credit, text("43"), &fx.rates)
        .unwrap();
    assert_eq!(fx.txn(id).splits().len(), 2);
    assert_eq!(fx.values(id)[0].1, usd("-43"));
    assert_eq!(fx.values(id)[1].1, usd("43"));
    assert_eq!(fx.displayed_amount(id), "43.00");
    fx.assert_balanced();
}

#[test]
fn crediting_the_debit_side_reverses_the_transaction() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    let first = fx.split_id(id, 0);
    fx.ledger
        .set_split_field(id, first, SplitField::Debit, text("42"), &fx.rates)
        .unwrap();
    assert_eq!(
        fx.values(id),
        vec![(Some(fx.foo), usd("42")), (Some(fx.bar), usd("-42"))]
    );
    assert_eq!(fx.displayed_amount(id), "42.00");
}

#[test]
fn added_split_is_taken_from_same_sign_main_split() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    let baz = fx.baz;
    fx.ledger
        .add_split(id, Some(baz), usd("1"), "", &fx.rates)
        .unwrap();
    assert_eq!(
        fx.values(id),
        vec![
            (Some(fx.foo), usd("-42")),
            (Some(fx.bar), usd("41")),
            (Some(fx.baz), usd("1")),
        ]
    );
    assert_eq!(fx.txn(id).shape(), TransactionShape::MultiSplit);
    assert_eq!(fx.displayed_amount(id), "42.00");
    fx.assert_balanced();
}

#[test]
fn zeroed_unassigned_split_is_removed() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    fx.ledger.add_split(id, None, usd("1"), "", &fx.rates).unwrap();
    assert_eq!(fx.txn(id).splits().len(), 3);
    let bar_split = fx.split_id(id, 1);
    fx.ledger
        .set_split_field(id, bar_split, SplitField::Debit, text("42"), &fx.rates)
        .unwrap();
    assert_eq!(
        fx.values(id),
        vec![(Some(fx.foo), usd("-42")), (Some(fx.bar), usd("42"))]
    );
    assert_eq!(fx.txn(id).shape(), TransactionShape::Simple);
}

#[test]
fn editing_main_split_of_multi_split_appends_unassigned() {
    let mut fx = Fixture::new();
    let id = fx.three_way();
    let foo_split = fx.split_id(id, 0);
    fx.ledger
        .set_split_field(id, foo_split, SplitField::Credit, text("43"), &fx.rates)
        .unwrap();
    assert_eq!(
        fx.values(id),
        vec![
            (Some(fx.foo), usd("-43")),
            (Some(fx.bar), usd("37")),
            (Some(fx.baz), usd("5")),
            (None, usd("1")),
        ]
    );
    assert_eq!(fx.displayed_amount(id), "42.00");
    fx.assert_balanced();
}

#[test]
fn editing_non_main_split_never_touches_other_assigned_splits() {
    let mut fx = Fixture::new();
    let id = fx.three_way();
    let baz_split = fx.split_id(id, 2);
    fx.ledger
        .set_split_amount(id, baz_split, usd("8"), &fx.rates)
        .unwrap();
    let values = fx.values(id);
    assert_eq!(values[0].1, usd("-42"));
    assert_eq!(values[1].1, usd("37"));
    assert_eq!(values[2].1, usd("8"));
    assert_eq!(values[3], (None, usd("-3")));

    // The existing unassigned split absorbs the next change.
    fx.ledger
        .set_split_amount(id, baz_split, usd("6"), &fx.rates)
        .unwrap();
    assert_eq!(fx.values(id)[3], (None, usd("-1")));
    fx.ledger
        .set_split_amount(id, baz_split, usd("5"), &fx.rates)
        .unwrap();
    assert_eq!(fx.txn(id).splits().len(), 3);
}

#[test]
fn deleting_a_split_shifts_and_records_imbalance() {
    let mut fx = Fixture::new();
    let id = fx.three_way();
    let foo_split = fx.split_id(id, 0);
    fx.ledger.delete_split(id, foo_split, &fx.rates).unwrap();
    assert_eq!(
        fx.values(id),
        vec![
            (Some(fx.bar), usd("37")),
            (Some(fx.baz), usd("5")),
            (None, usd("-42")),
        ]
    );
    assert!(fx.ledger.account(fx.foo).unwrap().entries().is_empty());
    assert_eq!(fx.displayed_amount(id), "42.00");
    fx.assert_balanced();
}

#[test]
fn setting_amount_on_multi_split_adjusts_debit_main_split() {
    let mut fx = Fixture::new();
    let id = fx.three_way();
    fx.ledger
        .set_transaction_field(id, TransactionField::Amount, text("43"), &fx.rates)
        .unwrap();
    assert_eq!(
        fx.values(id),
        vec![
            (Some(fx.foo), usd("-42")),
            (Some(fx.bar), usd("38")),
            (Some(fx.baz), usd("5")),
            (None, usd("-1")),
        ]
    );
    assert_eq!(fx.displayed_amount(id), "43.00");

    // Going back to the original amount drops the unassigned split.
    fx.ledger
        .set_transaction_amount(id, usd("42"), &fx.rates)
        .unwrap();
    assert_eq!(fx.txn(id).splits().len(), 3);
    assert_eq!(fx.displayed_amount(id), "42.00");

    let err = fx
        .ledger
        .set_transaction_amount(id, usd("3"), &fx.rates)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    fx.assert_balanced();
}

#[test]
fn amount_with_foreign_currency_retags_the_transaction() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    fx.ledger
        .set_transaction_field(id, TransactionField::Amount, text("12pln"), &fx.rates)
        .unwrap();
    let pln = Currency::new("PLN");
    assert_eq!(fx.txn(id).currency, Some(pln.clone()));
    for split in fx.txn(id).splits() {
        assert_eq!(split.amount.currency, pln);
    }
    assert_eq!(fx.displayed_amount(id), "PLN 12.00");
    fx.assert_balanced();
}

#[test]
fn negative_amount_is_taken_as_its_magnitude() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    fx.ledger
        .set_transaction_field(id, TransactionField::Amount, text("-12"), &fx.rates)
        .unwrap();
    assert_eq!(fx.displayed_amount(id), "12.00");
    assert_eq!(fx.values(id)[0], (Some(fx.foo), usd("-12")));
    assert_eq!(fx.values(id)[1], (Some(fx.bar), usd("12")));
}

#[test]
fn multi_currency_amount_is_average_of_converted_main_splits() {
    let mut fx = Fixture::new();
    let txn = Transaction::with_splits(
        date(2010, 2, 20),
        "exchange",
        vec![
            Split::new(Some(fx.foo), usd("-44")),
            Split::new(
                Some(fx.bar),
                Amount::new(rust_decimal::Decimal::new(42, 0), Currency::new("CAD")),
            ),
        ],
    );
    let id = fx.ledger.insert_transaction(txn, &fx.rates).unwrap();
    assert_eq!(fx.displayed_amount(id), "48.25");
    assert_eq!(fx.values(id)[2], (None, usd("-8.50")));
    fx.assert_balanced();
}

#[test]
fn foreign_edit_on_simple_transaction_keeps_other_leg() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    let bar_split = fx.split_id(id, 1);
    fx.ledger
        .set_split_field(id, bar_split, SplitField::Debit, text("42 cad"), &fx.rates)
        .unwrap();
    let values = fx.values(id);
    assert_eq!(values[0].1, usd("-42"));
    assert_eq!(values[1].1.currency, Currency::new("CAD"));
    assert_eq!(values[2], (None, usd("-10.50")));
    assert_eq!(fx.displayed_amount(id), "47.25");
    fx.assert_balanced();
}

#[test]
fn missing_rate_rejects_the_edit() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    let before = fx.txn(id).clone();
    let bar_split = fx.split_id(id, 1);
    fx.ledger.take_events();
    let err = fx
        .ledger
        .set_split_field(id, bar_split, SplitField::Debit, text("10 eur"), &fx.rates)
        .unwrap_err();
    assert!(matches!(err, LedgerError::RateUnavailable { .. }));
    assert_eq!(fx.txn(id), &before);
    assert!(fx.ledger.take_events().is_empty());
}

#[test]
fn reconciled_splits_are_locked() {
    let mut fx = Fixture::new();
    let id = fx.simple("42");
    let foo_split = fx.split_id(id, 0);
    let bar_split = fx.split_id(id, 1);
    fx.ledger
        .set_split_reconciled(id, bar_split, true, &fx.rates)
        .unwrap();

    let err = fx
        .ledger
        .set_split_amount(id, bar_split, usd("50"), &fx.rates)
        .unwrap_err();
    assert!(err.is_locked());
    assert!(fx
        .ledger
        .delete_split(id, bar_split, &fx.rates)
        .unwrap_err()
        .is_locked());
    assert!(fx.ledger.remove_transaction(id).unwrap_err().is_locked());

    // On a simple transaction the amount lives on both legs.
    let err = fx
        .ledger
        .set_transaction_amount(id, usd("60"), &fx.rates)
        .unwrap_err();
    assert!(err.is_locked());

    // The other leg can still change; the difference lands on an unassigned split.
    fx.ledger
        .set_split_field(id, foo_split, SplitField::Credit, text("50"), &fx.rates)
        .unwrap();
    assert_eq!(fx.values(id)[1], (Some(fx.bar), usd("42")));
    assert_eq!(fx.values(id)[2], (None, usd("8")));

    fx.ledger
        .set_split_reconciled(id, bar_split, false, &fx.rates)
        .unwrap();
    fx.ledger
        .set_split_amount(id, bar_split, usd("50"), &fx.rates)
        .unwrap();
    assert_eq!(fx.txn(id).splits().len(), 2);
    fx.assert_balanced();
}

#[test]
fn every_edit_sequence_stays_balanced() {
    let mut fx = Fixture::new();
    let id = fx.simple("100");
    let (foo, bar, baz) = (fx.foo, fx.bar, fx.baz);
    let rates = fx.rates.clone();

    let extra = fx.ledger.add_split(id, Some(baz), usd("30"), "tip", &rates).unwrap();
    fx.assert_balanced();
    fx.ledger.add_split(id, None, usd("-7"), "", &rates).unwrap();
    fx.assert_balanced();
    fx.ledger.set_split_amount(id, extra, usd("12.34"), &rates).unwrap();
    fx.assert_balanced();
    fx.ledger
        .set_transaction_amount(id, usd("250"), &rates)
        .unwrap();
    fx.assert_balanced();
    fx.ledger.assign_split_account(id, extra, Some(foo), &rates).unwrap();
    fx.assert_balanced();
    let first = fx.split_id(id, 0);
    fx.ledger.delete_split(id, first, &rates).unwrap();
    fx.assert_balanced();
    fx.ledger
        .set_transaction_currency(id, Currency::new("CAD"), &rates)
        .unwrap();
    fx.assert_balanced();
    fx.ledger
        .set_transaction_field(id, TransactionField::Date, FieldValue::Date(date(2011, 1, 1)), &rates)
        .unwrap();
    fx.assert_balanced();
    let second = fx.split_id(id, 1);
    fx.ledger.assign_split_account(id, second, Some(bar), &rates).unwrap();
    fx.assert_balanced();
}

#[test]
fn inserted_transaction_is_balanced_on_entry() {
    let mut fx = Fixture::new();
    let txn = Transaction::with_splits(
        date(2010, 2, 20),
        "lopsided",
        vec![
            Split::new(Some(fx.foo), usd("-10")),
            Split::new(Some(fx.bar), usd("4")),
        ],
    );
    let id = fx.ledger.insert_transaction(txn, &fx.rates).unwrap();
    assert_eq!(fx.values(id)[2], (None, usd("6")));
    fx.assert_balanced();
}
