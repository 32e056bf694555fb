use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// Iteration cap when scanning forward for occurrences that may be skipped
/// (a fifth weekday that a month does not have).
pub const MAX_SKIPPED_PERIODS: u32 = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RepeatType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Same weekday in the same week of the month as the start date,
    /// e.g. the third Tuesday.
    WeekdayOfMonth,
    /// Last occurrence of the start date's weekday in the month.
    LastWeekdayOfMonth,
}

/// Recurrence rule anchored on a start date.
///
/// Occurrence `k` is always computed from `start_date` so a clamped month end
/// (Jan 31 -> Feb 28) never drifts the following occurrences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "StoredRepeatRule")]
pub struct RepeatRule {
    pub repeat_type: RepeatType,
    every: u32,
    start_date: NaiveDate,
    /// Exclusive upper bound on occurrence dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop_date: Option<NaiveDate>,
}

/// Unchecked form of a stored rule; loading goes through [`RepeatRule::new`].
#[derive(Deserialize)]
struct StoredRepeatRule {
    repeat_type: RepeatType,
    every: i64,
    start_date: NaiveDate,
    #[serde(default)]
    stop_date: Option<NaiveDate>,
}

impl TryFrom<StoredRepeatRule> for RepeatRule {
    type Error = LedgerError;

    fn try_from(stored: StoredRepeatRule) -> Result<Self> {
        RepeatRule::new(
            stored.repeat_type,
            stored.every,
            stored.start_date,
            stored.stop_date,
        )
    }
}

impl RepeatRule {
    pub fn new(
        repeat_type: RepeatType,
        every: i64,
        start_date: NaiveDate,
        stop_date: Option<NaiveDate>,
    ) -> Result<Self> {
        if every <= 0 {
            return Err(LedgerError::InvalidRecurrence(format!(
                "repeat every must be positive, got {every}"
            )));
        }
        let every = u32::try_from(every).map_err(|_| {
            LedgerError::InvalidRecurrence(format!("repeat every {every} is too large"))
        })?;
        let rule = Self {
            repeat_type,
            every,
            start_date,
            stop_date: None,
        };
        rule.with_stop_date(stop_date)
    }

    pub fn every(&self) -> u32 {
        self.every
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn stop_date(&self) -> Option<NaiveDate> {
        self.stop_date
    }

    pub fn with_stop_date(mut self, stop_date: Option<NaiveDate>) -> Result<Self> {
        if let Some(stop) = stop_date {
            if stop < self.start_date {
                return Err(LedgerError::InvalidRecurrence(format!(
                    "stop date {stop} precedes start date {}",
                    self.start_date
                )));
            }
        }
        self.stop_date = stop_date;
        Ok(self)
    }

    /// Date of the `index`-th occurrence, or `None` when that period has no
    /// matching day (only possible for `WeekdayOfMonth` in its fifth week).
    pub fn occurrence(&self, index: u32) -> Option<NaiveDate> {
        let steps = i64::from(index) * i64::from(self.every);
        match self.repeat_type {
            RepeatType::Daily => self.start_date.checked_add_signed(Duration::days(steps)),
            RepeatType::Weekly => self.start_date.checked_add_signed(Duration::weeks(steps)),
            RepeatType::Monthly => shift_month(self.start_date, steps),
            RepeatType::Yearly => shift_month(self.start_date, steps * 12),
            RepeatType::WeekdayOfMonth => {
                let month = shift_month(first_of_month(self.start_date)?, steps)?;
                let week = (self.start_date.day() - 1) / 7;
                nth_weekday(month, self.start_date.weekday(), week)
            }
            RepeatType::LastWeekdayOfMonth => {
                let month = shift_month(first_of_month(self.start_date)?, steps)?;
                last_weekday(month, self.start_date.weekday())
            }
        }
    }

    /// Occurrence dates `d` with `from <= d < to`, honouring the stop date.
    pub fn occurrences_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let limit = match self.stop_date {
            Some(stop) => stop.min(to),
            None => to,
        };
        let mut skipped = 0;
        let mut index: u32 = 0;
        loop {
            match self.occurrence(index) {
                Some(date) => {
                    if date >= limit {
                        break;
                    }
                    if date >= from {
                        dates.push(date);
                    }
                    skipped = 0;
                }
                None => {
                    skipped += 1;
                    if skipped > MAX_SKIPPED_PERIODS || self.period_start(index) >= Some(limit) {
                        break;
                    }
                }
            }
            index = match index.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// First occurrence strictly after `date`.
    pub fn next_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut index: u32 = 0;
        let mut skipped = 0;
        loop {
            match self.occurrence(index) {
                Some(candidate) => {
                    if self.stop_date.is_some_and(|stop| candidate >= stop) {
                        return None;
                    }
                    if candidate > date {
                        return Some(candidate);
                    }
                    skipped = 0;
                }
                None => {
                    skipped += 1;
                    if skipped > MAX_SKIPPED_PERIODS {
                        return None;
                    }
                }
            }
            index = index.checked_add(1)?;
        }
    }

    pub fn is_occurrence(&self, date: NaiveDate) -> bool {
        match date.checked_add_signed(Duration::days(1)) {
            Some(next) => self.occurrences_between(date, next).contains(&date),
            None => false,
        }
    }

    pub fn label(&self) -> String {
        let unit = match self.repeat_type {
            RepeatType::Daily => "day",
            RepeatType::Weekly => "week",
            RepeatType::Monthly
            | RepeatType::WeekdayOfMonth
            | RepeatType::LastWeekdayOfMonth => "month",
            RepeatType::Yearly => "year",
        };
        let cadence = match (self.every, self.repeat_type) {
            (1, RepeatType::Daily) => "Daily".to_string(),
            (1, RepeatType::Weekly) => "Weekly".to_string(),
            (1, RepeatType::Monthly) => "Monthly".to_string(),
            (1, RepeatType::Yearly) => "Yearly".to_string(),
            (1, _) => "Every month".to_string(),
            (n, _) => format!("Every {n} {unit}s"),
        };
        match self.repeat_type {
            RepeatType::WeekdayOfMonth => format!(
                "{cadence} on the {} {:?}",
                ordinal((self.start_date.day() - 1) / 7 + 1),
                self.start_date.weekday()
            ),
            RepeatType::LastWeekdayOfMonth => {
                format!("{cadence} on the last {:?}", self.start_date.weekday())
            }
            _ => cadence,
        }
    }

    fn period_start(&self, index: u32) -> Option<NaiveDate> {
        let steps = i64::from(index) * i64::from(self.every);
        shift_month(first_of_month(self.start_date)?, steps)
    }
}

fn ordinal(n: u32) -> &'static str {
    match n {
        1 => "first",
        2 => "second",
        3 => "third",
        4 => "fourth",
        _ => "fifth",
    }
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

/// Moves `date` by `months`, clamping the day to the target month's length.
pub(crate) fn shift_month(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_next.pred_opt()?.day())
}

fn nth_weekday(month_start: NaiveDate, weekday: Weekday, week: u32) -> Option<NaiveDate> {
    let offset = (7 + weekday.num_days_from_monday()
        - month_start.weekday().num_days_from_monday())
        % 7;
    let day = 1 + offset + week * 7;
    if day > days_in_month(month_start.year(), month_start.month())? {
        return None;
    }
    month_start.with_day(day)
}

fn last_weekday(month_start: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let last_day = days_in_month(month_start.year(), month_start.month())?;
    let last = month_start.with_day(last_day)?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last.checked_sub_signed(Duration::days(i64::from(back)))
}
