//! Recurrence math for expenses.
//!
//! Everything here is pure calendar arithmetic over [`NaiveDate`]: no clock,
//! no storage. A [`Schedule`] decides whether a date is an occurrence
//! ([`Schedule::occurs_on`]) and can enumerate occurrences in order
//! ([`Schedule::occurrences_from`]).
//!
//! Occurrence enumeration computes month and year steps from the anchor
//! (`anchor + n` months) so it agrees with `occurs_on`. The next-due walk
//! instead adds one step at a time to the previous due date, and a clipped
//! day stays clipped (Jan 31, Feb 29, Mar 29).

use std::{collections::HashSet, str::FromStr};

use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Cadence of an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceRate {
    Once,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceRate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl TryFrom<&str> for RecurrenceRate {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::validation(
                "recurrence_rate",
                format!("unknown recurrence rate: {other}"),
            )),
        }
    }
}

impl FromStr for RecurrenceRate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.trim())
    }
}

/// The recurrence-relevant part of an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub rate: RecurrenceRate,
    pub start_date: NaiveDate,
    /// Inclusive upper bound.
    pub end_date: Option<NaiveDate>,
    /// Only meaningful for [`RecurrenceRate::Monthly`].
    pub due_end_of_month: bool,
}

impl Schedule {
    /// Builds a schedule, rejecting an `end_date` before `start_date`.
    pub fn new(
        rate: RecurrenceRate,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        due_end_of_month: bool,
    ) -> ResultEngine<Self> {
        if let Some(end) = end_date
            && end < start_date
        {
            return Err(EngineError::validation(
                "end_date",
                "end_date must not be before start_date",
            ));
        }
        Ok(Self {
            rate,
            start_date,
            end_date,
            due_end_of_month,
        })
    }

    /// Returns `true` if the expense is due on `date`.
    ///
    /// Monthly schedules match the start day of month; a month without that
    /// day (e.g. the 31st in February) has no plain occurrence and is only
    /// covered when `due_end_of_month` is set. Yearly schedules anchored on
    /// Feb 29 only occur in leap years.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date || self.end_date.is_some_and(|end| date > end) {
            return false;
        }

        match self.rate {
            RecurrenceRate::Once => date == self.start_date,
            RecurrenceRate::Daily => true,
            RecurrenceRate::Weekly => (date - self.start_date).num_days() % 7 == 0,
            RecurrenceRate::Monthly => {
                (self.due_end_of_month && is_last_day_of_month(date))
                    || date.day() == self.start_date.day()
            }
            RecurrenceRate::Yearly => {
                date.month() == self.start_date.month() && date.day() == self.start_date.day()
            }
        }
    }

    /// Iterates occurrences `>= from` in ascending order.
    ///
    /// The iterator ends at `end_date`; for open-ended schedules it is
    /// infinite, so callers bound it (see [`Schedule::occurrences_between`]).
    pub fn occurrences_from(&self, from: NaiveDate) -> Occurrences {
        let from = from.max(self.start_date);
        let (period, exhausted) = match self.rate {
            RecurrenceRate::Once => (0, false),
            // The previous month can still hold a last-day occurrence >= from.
            RecurrenceRate::Monthly => match first_step_on_or_after(self.rate, self.start_date, from)
            {
                Some(n) => (n.saturating_sub(1), false),
                None => (0, true),
            },
            _ => match first_step_on_or_after(self.rate, self.start_date, from) {
                Some(n) => (n, false),
                None => (0, true),
            },
        };

        Occurrences {
            schedule: *self,
            from,
            period,
            pending: Vec::with_capacity(2),
            exhausted,
        }
    }

    /// Occurrences in the inclusive window `[from, to]`.
    pub fn occurrences_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = NaiveDate> + use<> {
        self.occurrences_from(from).take_while(move |date| *date <= to)
    }

    /// Occurrences in `[start_date, until]` that are not in `settled`.
    pub fn outstanding_until(
        &self,
        until: NaiveDate,
        settled: &HashSet<NaiveDate>,
    ) -> Vec<NaiveDate> {
        self.occurrences_between(self.start_date, until)
            .filter(|date| !settled.contains(date))
            .collect()
    }

    /// First occurrence `>= from` that is not in `settled`, if any.
    pub fn next_unsettled_from(
        &self,
        from: NaiveDate,
        settled: &HashSet<NaiveDate>,
    ) -> Option<NaiveDate> {
        self.occurrences_from(from)
            .find(|date| !settled.contains(date))
    }
}

/// Ascending iterator over the occurrences of a [`Schedule`].
#[derive(Clone, Debug)]
pub struct Occurrences {
    schedule: Schedule,
    from: NaiveDate,
    period: u32,
    /// Candidates of the current period, stored in descending order.
    pending: Vec<NaiveDate>,
    exhausted: bool,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(date) = self.pending.pop() {
                return Some(date);
            }
            if self.exhausted {
                return None;
            }

            let schedule = self.schedule;
            let Some(anchor) = step(schedule.rate, schedule.start_date, self.period) else {
                self.exhausted = true;
                continue;
            };

            let period_floor = match schedule.rate {
                RecurrenceRate::Monthly => anchor.with_day(1).unwrap_or(anchor),
                _ => anchor,
            };
            if schedule.end_date.is_some_and(|end| period_floor > end) {
                self.exhausted = true;
                continue;
            }

            let mut candidates = vec![anchor];
            if schedule.rate == RecurrenceRate::Monthly && schedule.due_end_of_month {
                let last = last_day_of_month(anchor);
                if last != anchor {
                    candidates.push(last);
                }
            }
            candidates.retain(|date| *date >= self.from && schedule.occurs_on(*date));
            candidates.sort_unstable_by(|a, b| b.cmp(a));
            self.pending = candidates;

            match schedule.rate {
                RecurrenceRate::Once => self.exhausted = true,
                _ => match self.period.checked_add(1) {
                    Some(next) => self.period = next,
                    None => self.exhausted = true,
                },
            }
        }
    }
}

/// Walks forward from `current_due_date` by the cadence step until the
/// result is on or after `today`. Each month or year step starts from the
/// previous result, so a day clipped by a short month is carried forward.
///
/// `Once` never advances and yields `None`: the single occurrence is the
/// start date, which the caller handles.
///
/// ```rust
/// use chrono::NaiveDate;
/// use engine::{RecurrenceRate, next_due_date_on_or_after};
///
/// let due = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
/// assert_eq!(
///     next_due_date_on_or_after(RecurrenceRate::Monthly, due, today),
///     NaiveDate::from_ymd_opt(2024, 4, 15),
/// );
/// ```
pub fn next_due_date_on_or_after(
    rate: RecurrenceRate,
    current_due_date: NaiveDate,
    today: NaiveDate,
) -> Option<NaiveDate> {
    match rate {
        RecurrenceRate::Once => None,
        // Fixed-length steps: jumping straight to the n-th step is the same walk.
        RecurrenceRate::Daily | RecurrenceRate::Weekly => {
            let n = first_step_on_or_after(rate, current_due_date, today)?;
            step(rate, current_due_date, n)
        }
        RecurrenceRate::Monthly | RecurrenceRate::Yearly => {
            let mut due = current_due_date;
            while due < today {
                due = step(rate, due, 1)?;
            }
            Some(due)
        }
    }
}

/// [`next_due_date_on_or_after`] against the current UTC calendar date.
pub fn next_due_date_on_or_after_today(
    rate: RecurrenceRate,
    current_due_date: NaiveDate,
) -> Option<NaiveDate> {
    next_due_date_on_or_after(rate, current_due_date, Utc::now().date_naive())
}

/// Returns `anchor + n` cadence steps.
fn step(rate: RecurrenceRate, anchor: NaiveDate, n: u32) -> Option<NaiveDate> {
    match rate {
        RecurrenceRate::Once => (n == 0).then_some(anchor),
        RecurrenceRate::Daily => anchor.checked_add_days(Days::new(u64::from(n))),
        RecurrenceRate::Weekly => anchor.checked_add_days(Days::new(u64::from(n) * 7)),
        RecurrenceRate::Monthly => anchor.checked_add_months(Months::new(n)),
        RecurrenceRate::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
    }
}

/// Smallest `n` such that `step(rate, anchor, n) >= target`.
fn first_step_on_or_after(rate: RecurrenceRate, anchor: NaiveDate, target: NaiveDate) -> Option<u32> {
    if target <= anchor {
        return Some(0);
    }

    let days = (target - anchor).num_days();
    let estimate: i64 = match rate {
        RecurrenceRate::Once => return None,
        RecurrenceRate::Daily => days,
        RecurrenceRate::Weekly => (days + 6) / 7,
        RecurrenceRate::Monthly => months_between(anchor, target),
        RecurrenceRate::Yearly => i64::from(target.year() - anchor.year()),
    };

    let mut n = u32::try_from(estimate.max(0)).ok()?;
    while step(rate, anchor, n)? < target {
        n = n.checked_add(1)?;
    }
    Some(n)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

/// Number of days in the given month (28-31).
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

pub(crate) fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let last = days_in_month(date.year(), date.month());
    date.with_day(last).unwrap_or(date)
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}
