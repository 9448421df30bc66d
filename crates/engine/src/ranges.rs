//! Named reporting periods ("this month", "last 6 months", ...) resolved to
//! concrete inclusive date pairs.

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EngineError, recurrence::days_in_month};

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeToken {
    AllTime,
    ThisWeek,
    ThisMonth,
    ThisYear,
    #[serde(rename = "last-6-months")]
    LastSixMonths,
}

impl RangeToken {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllTime => "all-time",
            Self::ThisWeek => "this-week",
            Self::ThisMonth => "this-month",
            Self::ThisYear => "this-year",
            Self::LastSixMonths => "last-6-months",
        }
    }

    /// Resolves the token against `today`. Both bounds are inclusive.
    pub fn resolve(self, today: NaiveDate) -> ResolvedRange {
        match self {
            Self::AllTime => ResolvedRange::Unbounded,
            Self::ThisWeek => {
                let since_sunday = u64::from(today.weekday().num_days_from_sunday());
                let start = today - Days::new(since_sunday);
                ResolvedRange::Bounded {
                    start,
                    end: start + Days::new(6),
                }
            }
            Self::ThisMonth => {
                let last = days_in_month(today.year(), today.month());
                ResolvedRange::Bounded {
                    start: today.with_day(1).unwrap_or(today),
                    end: today.with_day(last).unwrap_or(today),
                }
            }
            Self::ThisYear => ResolvedRange::Bounded {
                start: today.with_ordinal(1).unwrap_or(today),
                end: NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            },
            Self::LastSixMonths => ResolvedRange::Bounded {
                start: today.checked_sub_months(Months::new(6)).unwrap_or(today),
                end: today,
            },
        }
    }
}

impl TryFrom<&str> for RangeToken {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "all-time" => Ok(Self::AllTime),
            "this-week" => Ok(Self::ThisWeek),
            "this-month" => Ok(Self::ThisMonth),
            "this-year" => Ok(Self::ThisYear),
            "last-6-months" => Ok(Self::LastSixMonths),
            other => Err(EngineError::validation(
                "range",
                format!("unknown range: {other}"),
            )),
        }
    }
}

impl FromStr for RangeToken {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.trim())
    }
}

/// Result of resolving a [`RangeToken`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedRange {
    /// No bound: callers omit the date predicate entirely.
    Unbounded,
    Bounded { start: NaiveDate, end: NaiveDate },
}

impl ResolvedRange {
    pub fn bounds(self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Self::Unbounded => None,
            Self::Bounded { start, end } => Some((start, end)),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded { start, end } => start <= date && date <= end,
        }
    }

    /// `yyyy-MM-dd` rendering of the bounds.
    pub fn to_iso(self) -> Option<(String, String)> {
        self.bounds().map(|(start, end)| {
            (
                start.format(ISO_DATE).to_string(),
                end.format(ISO_DATE).to_string(),
            )
        })
    }
}

/// Parses a `yyyy-MM-dd` date, labelling failures with `field`.
pub(crate) fn parse_iso_date(value: &str, field: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE).map_err(|_| {
        EngineError::validation(field, format!("expected yyyy-MM-dd, got '{}'", value.trim()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn this_week_starts_on_sunday() {
        // 2024-03-20 is a Wednesday.
        let range = RangeToken::ThisWeek.resolve(d(2024, 3, 20));
        assert_eq!(range.bounds(), Some((d(2024, 3, 17), d(2024, 3, 23))));

        let sunday = RangeToken::ThisWeek.resolve(d(2024, 3, 17));
        assert_eq!(sunday.bounds(), Some((d(2024, 3, 17), d(2024, 3, 23))));
    }

    #[test]
    fn this_month_uses_days_in_month() {
        assert_eq!(
            RangeToken::ThisMonth.resolve(d(2024, 2, 10)).bounds(),
            Some((d(2024, 2, 1), d(2024, 2, 29)))
        );
        assert_eq!(
            RangeToken::ThisMonth.resolve(d(2023, 2, 10)).bounds(),
            Some((d(2023, 2, 1), d(2023, 2, 28)))
        );
    }

    #[test]
    fn this_year_and_last_six_months() {
        assert_eq!(
            RangeToken::ThisYear.resolve(d(2024, 7, 4)).to_iso(),
            Some(("2024-01-01".to_string(), "2024-12-31".to_string()))
        );
        assert_eq!(
            RangeToken::LastSixMonths.resolve(d(2024, 8, 31)).bounds(),
            Some((d(2024, 2, 29), d(2024, 8, 31)))
        );
    }

    #[test]
    fn all_time_is_unbounded() {
        let range = RangeToken::AllTime.resolve(d(2024, 1, 1));
        assert_eq!(range, ResolvedRange::Unbounded);
        assert_eq!(range.to_iso(), None);
        assert!(range.contains(d(1990, 1, 1)));
    }

    #[test]
    fn tokens_parse_and_reject_unknown() {
        assert_eq!("last-6-months".parse::<RangeToken>().unwrap(), RangeToken::LastSixMonths);
        assert_eq!(
            serde_json::to_string(&RangeToken::LastSixMonths).unwrap(),
            "\"last-6-months\""
        );
        assert!(matches!(
            "last-week".parse::<RangeToken>(),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn iso_dates_are_strict() {
        assert_eq!(parse_iso_date("2024-02-29", "date").unwrap(), d(2024, 2, 29));
        assert!(parse_iso_date("2023-02-29", "date").is_err());
        assert!(parse_iso_date("29/02/2024", "date").is_err());
    }
}
