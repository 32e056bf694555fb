mod common;

use std::fs;

use common::{date, temp_path, usd, Fixture};
use ledger_core::ledger::{ChangeScope, RepeatRule, RepeatType, Schedule, Split, Transaction};
use ledger_core::storage::{load_ledger_from_file, save_ledger_to_file};
use ledger_core::LedgerError;
use serde_json::Value;

#[test]
fn saved_ledger_loads_back_with_schedules_and_overrides() {
    let mut fx = Fixture::new();
    let rates = fx.rates.clone();
    let id = fx.three_way();
    let template = Transaction::with_splits(
        date(2024, 1, 15),
        "gym",
        vec![
            Split::new(Some(fx.foo), usd("-30")),
            Split::new(Some(fx.baz), usd("30")),
        ],
    );
    let rule = RepeatRule::new(RepeatType::Monthly, 1, date(2024, 1, 15), None).unwrap();
    let schedule_id = fx
        .ledger
        .add_schedule(Schedule::new(template, rule), &rates)
        .unwrap();
    fx.ledger
        .delete_schedule_occurrence(schedule_id, date(2024, 3, 15))
        .unwrap();
    let mut changed = fx.ledger.materialize(date(2024, 5, 1), date(2024, 6, 1))[0]
        .transaction
        .clone();
    changed.description = "gym (annual fee)".into();
    fx.ledger
        .edit_spawn(schedule_id, date(2024, 5, 15), changed, ChangeScope::ThisOccurrence, &rates)
        .unwrap();
    let before = fx.ledger.materialize(date(2024, 1, 1), date(2025, 1, 1));

    let path = temp_path("household.json");
    save_ledger_to_file(&fx.ledger, &path).unwrap();
    assert!(!path.with_extension("json.tmp").exists());

    let mut loaded = load_ledger_from_file(&path).unwrap();
    loaded.check_consistency(&rates).unwrap();
    assert_eq!(loaded.transaction(id), fx.ledger.transaction(id));
    assert_eq!(loaded.accounts(), fx.ledger.accounts());
    let after = loaded.materialize(date(2024, 1, 1), date(2025, 1, 1));
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.transaction, b.transaction);
    }
    assert_eq!(after.len(), 11);
}

#[test]
fn amounts_are_stored_as_exact_decimal_strings() {
    let mut fx = Fixture::new();
    fx.simple("0.10");
    let path = temp_path("exact.json");
    save_ledger_to_file(&fx.ledger, &path).unwrap();
    let json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let amount = &json["transactions"][0]["splits"][1]["amount"];
    assert_eq!(amount["value"], Value::String("0.10".into()));
    assert_eq!(amount["currency"], Value::String("USD".into()));
}

#[test]
fn dangling_account_reference_is_reported() {
    let mut fx = Fixture::new();
    fx.simple("42");
    let path = temp_path("broken.json");
    save_ledger_to_file(&fx.ledger, &path).unwrap();

    let mut json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let accounts = json["accounts"].as_array_mut().unwrap();
    accounts.retain(|account| account["name"] != "bar");
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let err = load_ledger_from_file(&path).unwrap_err();
    assert!(matches!(err, LedgerError::Inconsistent(_)));
}

#[test]
fn stale_entries_are_rebuilt_on_load() {
    let mut fx = Fixture::new();
    fx.simple("42");
    let path = temp_path("stale.json");
    save_ledger_to_file(&fx.ledger, &path).unwrap();

    let mut json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    for account in json["accounts"].as_array_mut().unwrap() {
        account["entries"] = Value::Array(Vec::new());
    }
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let loaded = load_ledger_from_file(&path).unwrap();
    assert_eq!(loaded.account(fx.bar).unwrap().entries().len(), 1);
    loaded.check_consistency(&fx.rates).unwrap();
}

#[test]
fn stored_rule_with_zero_interval_is_refused() {
    let mut fx = Fixture::new();
    let rates = fx.rates.clone();
    let template = Transaction::with_splits(
        date(2024, 1, 1),
        "coffee",
        vec![
            Split::new(Some(fx.foo), usd("-3")),
            Split::new(Some(fx.bar), usd("3")),
        ],
    );
    let rule = RepeatRule::new(RepeatType::Daily, 1, date(2024, 1, 1), None).unwrap();
    fx.ledger
        .add_schedule(Schedule::new(template, rule), &rates)
        .unwrap();
    let path = temp_path("zero-every.json");
    save_ledger_to_file(&fx.ledger, &path).unwrap();

    let mut json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["schedules"][0]["rule"]["every"] = Value::from(0);
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let err = load_ledger_from_file(&path).unwrap_err();
    assert!(matches!(err, LedgerError::Serde(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = temp_path("absent.json");
    let err = load_ledger_from_file(&path).unwrap_err();
    assert!(matches!(err, LedgerError::Io(_)));
}
