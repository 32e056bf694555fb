use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recurring::{spawn_from_template, ScheduleMaterializer, Spawn};
use super::time_interval::RepeatRule;
use super::transaction::Transaction;
use crate::errors::{LedgerError, Result};

/// Per-date override of a single occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "transaction", rename_all = "snake_case")]
pub enum ScheduleException {
    /// Tombstone: the occurrence is skipped.
    Deleted,
    /// The occurrence is replaced verbatim by this transaction.
    Modified(Transaction),
}

/// How far an edit made on one spawn reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    ThisOccurrence,
    FromThisDateForward,
}

/// A template transaction plus the rule that repeats it.
///
/// Overrides are keyed by recurrence date (the date the rule produced, not the
/// possibly edited transaction date), so they survive edits to the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: Uuid,
    template: Transaction,
    rule: RepeatRule,
    #[serde(default)]
    exceptions: BTreeMap<NaiveDate, ScheduleException>,
    #[serde(default)]
    global_changes: BTreeMap<NaiveDate, Transaction>,
}

impl Schedule {
    pub fn new(template: Transaction, rule: RepeatRule) -> Self {
        let mut template = template;
        template.date = rule.start_date();
        Self {
            id: Uuid::new_v4(),
            template,
            rule,
            exceptions: BTreeMap::new(),
            global_changes: BTreeMap::new(),
        }
    }

    pub fn template(&self) -> &Transaction {
        &self.template
    }

    pub fn rule(&self) -> &RepeatRule {
        &self.rule
    }

    pub fn exceptions(&self) -> &BTreeMap<NaiveDate, ScheduleException> {
        &self.exceptions
    }

    pub fn global_changes(&self) -> &BTreeMap<NaiveDate, Transaction> {
        &self.global_changes
    }

    pub fn start_date(&self) -> NaiveDate {
        self.rule.start_date()
    }

    pub fn stop_date(&self) -> Option<NaiveDate> {
        self.rule.stop_date()
    }

    /// Replaces the base template. This is a global change made at the start
    /// date, so earlier global changes are superseded.
    pub fn set_template(&mut self, template: Transaction) {
        let start = self.start_date();
        let mut template = template;
        template.date = start;
        self.template = template;
        self.global_changes.retain(|date, _| *date > start);
        self.prune_redundant_exceptions(start);
    }

    /// Replaces the repeat rule. Overrides keyed by dates the new rule no longer
    /// produces are kept but stay dormant.
    pub fn set_rule(&mut self, rule: RepeatRule) {
        self.rule = rule;
        self.template.date = self.rule.start_date();
    }

    pub fn set_stop_date(&mut self, stop_date: Option<NaiveDate>) -> Result<()> {
        self.rule = self.rule.clone().with_stop_date(stop_date)?;
        Ok(())
    }

    /// Ends the schedule so that `last` is its final possible occurrence.
    pub fn stop_after(&mut self, last: NaiveDate) -> Result<()> {
        let stop = last
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| LedgerError::InvalidRecurrence(format!("cannot stop after {last}")))?;
        self.set_stop_date(Some(stop))
    }

    /// Template in effect at `date`: the latest global change at or before it,
    /// else the base template.
    pub fn template_for(&self, date: NaiveDate) -> &Transaction {
        self.global_changes
            .range(..=date)
            .next_back()
            .map(|(_, template)| template)
            .unwrap_or(&self.template)
    }

    pub fn exception(&self, date: NaiveDate) -> Option<&ScheduleException> {
        self.exceptions.get(&date)
    }

    /// Tombstones one occurrence.
    pub fn delete_occurrence(&mut self, date: NaiveDate) -> Result<()> {
        self.ensure_occurrence(date)?;
        self.exceptions.insert(date, ScheduleException::Deleted);
        Ok(())
    }

    /// Overrides one occurrence. An override identical to what the schedule
    /// would produce anyway is dropped instead of stored.
    pub fn change_occurrence(&mut self, date: NaiveDate, transaction: Transaction) -> Result<()> {
        self.ensure_occurrence(date)?;
        let expected = spawn_from_template(self.id, self.template_for(date), date);
        if transaction.same_content(&expected) {
            self.exceptions.remove(&date);
            return Ok(());
        }
        let mut transaction = transaction;
        transaction.id = expected.id;
        self.exceptions
            .insert(date, ScheduleException::Modified(transaction));
        Ok(())
    }

    /// Removes any override for `date`. Returns whether one existed.
    pub fn reset_occurrence(&mut self, date: NaiveDate) -> bool {
        self.exceptions.remove(&date).is_some()
    }

    /// Makes `template` the template for every occurrence from `date` on.
    pub fn change_globally(&mut self, date: NaiveDate, template: Transaction) {
        if date <= self.start_date() {
            self.set_template(template);
            return;
        }
        let mut template = template;
        template.date = date;
        self.global_changes.insert(date, template);
        self.prune_redundant_exceptions(date);
    }

    /// Spawns whose recurrence date lies in `[from, to)`.
    pub fn materialize(&self, from: NaiveDate, to: NaiveDate) -> Vec<Spawn> {
        ScheduleMaterializer::materialize(self, from, to)
    }

    /// Next non-deleted occurrence strictly after `date`.
    pub fn next_occurrence_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut cursor = date;
        loop {
            let next = self.rule.next_after(cursor)?;
            if !matches!(self.exceptions.get(&next), Some(ScheduleException::Deleted)) {
                return Some(next);
            }
            cursor = next;
        }
    }

    pub fn references_account(&self, account: Uuid) -> bool {
        self.transactions().any(|txn| txn.references_account(account))
    }

    pub(crate) fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        std::iter::once(&self.template)
            .chain(self.global_changes.values())
            .chain(self.exceptions.values().filter_map(|exception| match exception {
                ScheduleException::Modified(txn) => Some(txn),
                ScheduleException::Deleted => None,
            }))
    }

    pub(crate) fn transactions_mut(&mut self) -> impl Iterator<Item = &mut Transaction> {
        std::iter::once(&mut self.template)
            .chain(self.global_changes.values_mut())
            .chain(
                self.exceptions
                    .values_mut()
                    .filter_map(|exception| match exception {
                        ScheduleException::Modified(txn) => Some(txn),
                        ScheduleException::Deleted => None,
                    }),
            )
    }

    fn ensure_occurrence(&self, date: NaiveDate) -> Result<()> {
        if self.rule.is_occurrence(date) {
            Ok(())
        } else {
            Err(LedgerError::InvalidInput(format!(
                "{date} is not an occurrence of schedule {}",
                self.id
            )))
        }
    }

    /// Drops modified exceptions at or after `from` that now match what the
    /// template in effect would produce. Tombstones are kept.
    fn prune_redundant_exceptions(&mut self, from: NaiveDate) {
        let redundant: Vec<NaiveDate> = self
            .exceptions
            .range(from..)
            .filter_map(|(date, exception)| match exception {
                ScheduleException::Modified(txn) => {
                    let expected = spawn_from_template(self.id, self.template_for(*date), *date);
                    txn.same_content(&expected).then_some(*date)
                }
                ScheduleException::Deleted => None,
            })
            .collect();
        for date in redundant {
            tracing::debug!(schedule = %self.id, %date, "dropping redundant occurrence override");
            self.exceptions.remove(&date);
        }
    }
}
