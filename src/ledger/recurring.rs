use chrono::NaiveDate;
use uuid::Uuid;

use super::schedule::{Schedule, ScheduleException};
use super::transaction::Transaction;

/// Where a spawn's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOrigin {
    Template,
    GlobalChange(NaiveDate),
    Exception,
}

/// Transient transaction produced by a schedule for one recurrence date.
#[derive(Debug, Clone)]
pub struct Spawn {
    pub schedule_id: Uuid,
    pub recurrence_date: NaiveDate,
    pub origin: SpawnOrigin,
    pub transaction: Transaction,
}

/// Stateless expansion of schedules into spawns.
pub struct ScheduleMaterializer;

impl ScheduleMaterializer {
    /// Spawns of one schedule whose recurrence date lies in `[from, to)`, in
    /// date order. The result depends only on the schedule's data.
    pub fn materialize(schedule: &Schedule, from: NaiveDate, to: NaiveDate) -> Vec<Spawn> {
        if from >= to {
            return Vec::new();
        }
        let mut spawns = Vec::new();
        for date in schedule.rule().occurrences_between(from, to) {
            match schedule.exception(date) {
                Some(ScheduleException::Deleted) => continue,
                Some(ScheduleException::Modified(txn)) => spawns.push(Spawn {
                    schedule_id: schedule.id,
                    recurrence_date: date,
                    origin: SpawnOrigin::Exception,
                    transaction: txn.clone(),
                }),
                None => {
                    let origin = schedule
                        .global_changes()
                        .range(..=date)
                        .next_back()
                        .map(|(changed, _)| SpawnOrigin::GlobalChange(*changed))
                        .unwrap_or(SpawnOrigin::Template);
                    spawns.push(Spawn {
                        schedule_id: schedule.id,
                        recurrence_date: date,
                        origin,
                        transaction: spawn_from_template(
                            schedule.id,
                            schedule.template_for(date),
                            date,
                        ),
                    });
                }
            }
        }
        tracing::trace!(schedule = %schedule.id, count = spawns.len(), "materialized schedule");
        spawns
    }

    /// Spawns of several schedules, ordered by recurrence date then schedule id.
    pub fn materialize_all<'a, I>(schedules: I, from: NaiveDate, to: NaiveDate) -> Vec<Spawn>
    where
        I: IntoIterator<Item = &'a Schedule>,
    {
        let mut spawns: Vec<Spawn> = schedules
            .into_iter()
            .flat_map(|schedule| Self::materialize(schedule, from, to))
            .collect();
        spawns.sort_by(|a, b| {
            a.recurrence_date
                .cmp(&b.recurrence_date)
                .then_with(|| a.schedule_id.cmp(&b.schedule_id))
        });
        spawns
    }
}

/// Stable id of the spawn a schedule produces on `date`.
pub fn spawn_id(schedule_id: Uuid, date: NaiveDate) -> Uuid {
    Uuid::new_v5(&schedule_id, date.format("%Y-%m-%d").to_string().as_bytes())
}

/// Copies `template` onto `date` with ids derived from the schedule and date,
/// so repeated materialization yields identical spawns.
pub(crate) fn spawn_from_template(
    schedule_id: Uuid,
    template: &Transaction,
    date: NaiveDate,
) -> Transaction {
    let mut txn = template.clone();
    txn.id = spawn_id(schedule_id, date);
    txn.date = date;
    for (index, split) in txn.splits.iter_mut().enumerate() {
        split.id = Uuid::new_v5(&txn.id, index.to_string().as_bytes());
    }
    txn
}
