use chrono::{Datelike, Days, NaiveDate};

use crate::error::{DashboardError, Result};
use crate::models::{Interval, Mode, Query};

/// Both boundary forms of one calendar month, derived from the same
/// year/month pair so they can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBounds {
    pub year: i32,
    pub month: u32,
    pub first: NaiveDate,
    pub last_inclusive: NaiveDate,
    pub next_exclusive: NaiveDate,
}

impl MonthBounds {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(DashboardError::InvalidDate(format!("{year}-{month:02}")));
        }
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| DashboardError::InvalidDate(format!("{year}-{month:02}")))?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let next_exclusive = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .ok_or_else(|| DashboardError::InvalidDate(format!("{next_year}-{next_month:02}")))?;
        let last_inclusive = next_exclusive
            .pred_opt()
            .ok_or_else(|| DashboardError::InvalidDate(format!("{year}-{month:02}")))?;

        Ok(Self {
            year,
            month,
            first,
            last_inclusive,
            next_exclusive,
        })
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_inclusive.day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date < self.next_exclusive
    }

    pub fn key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub mode: Mode,
    pub interval: Interval,
    pub month: Option<MonthBounds>,
}

impl ResolvedRange {
    /// Half-open `[from, to)` bounds handed to record sources.
    pub fn fetch_bounds(&self) -> (NaiveDate, NaiveDate) {
        match self.month {
            Some(bounds) => (bounds.first, bounds.next_exclusive),
            None => (
                self.interval.from,
                self.interval
                    .to
                    .checked_add_days(Days::new(1))
                    .unwrap_or(self.interval.to),
            ),
        }
    }

    /// Whether a record dated `date` belongs to this range under the mode's
    /// membership rule.
    pub fn admits(&self, date: NaiveDate) -> bool {
        match (self.mode, self.month) {
            (Mode::SingleDay, _) => date == self.interval.from,
            (Mode::CalendarMonth, Some(bounds)) => bounds.contains(date),
            _ => self.interval.contains(date),
        }
    }
}

pub fn resolve(query: &Query) -> Result<ResolvedRange> {
    let mode = query.mode();
    match query {
        Query::SingleDay { day } => {
            let day = parse_ymd(day)?;
            Ok(ResolvedRange {
                mode,
                interval: Interval { from: day, to: day },
                month: None,
            })
        }
        Query::CustomRange { from, to } | Query::Week { from, to } => {
            let from = parse_ymd(from)?;
            let to = parse_ymd(to)?;
            if from > to {
                return Err(DashboardError::InvalidRange { from, to });
            }
            Ok(ResolvedRange {
                mode,
                interval: Interval { from, to },
                month: None,
            })
        }
        Query::CalendarMonth { year, month } => {
            let bounds = MonthBounds::new(*year, *month)?;
            Ok(ResolvedRange {
                mode,
                interval: Interval {
                    from: bounds.first,
                    to: bounds.last_inclusive,
                },
                month: Some(bounds),
            })
        }
    }
}

/// Parses a strict `YYYY-MM-DD` day. A trailing time part after `T` is ignored.
pub fn parse_ymd(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    let day = trimmed.split('T').next().unwrap_or(trimmed);
    let well_formed = day.len() == 10
        && day.char_indices().all(|(idx, ch)| match idx {
            4 | 7 => ch == '-',
            _ => ch.is_ascii_digit(),
        });
    if !well_formed {
        return Err(DashboardError::InvalidDate(input.to_string()));
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| DashboardError::InvalidDate(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_bounds_agree_for_every_month() {
        for year in [2023, 2024, 2025] {
            for month in 1..=12 {
                let bounds = MonthBounds::new(year, month).unwrap();
                assert_eq!(bounds.last_inclusive.succ_opt().unwrap(), bounds.next_exclusive);
                assert_eq!(bounds.first.day(), 1);
                assert_eq!(bounds.next_exclusive.day(), 1);
            }
        }
    }

    #[test]
    fn february_handles_leap_years() {
        assert_eq!(MonthBounds::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(MonthBounds::new(2025, 2).unwrap().days_in_month(), 28);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let bounds = MonthBounds::new(2025, 12).unwrap();
        assert_eq!(bounds.last_inclusive, ymd(2025, 12, 31));
        assert_eq!(bounds.next_exclusive, ymd(2026, 1, 1));
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(matches!(
            MonthBounds::new(2025, 13),
            Err(DashboardError::InvalidDate(_))
        ));
        assert!(matches!(
            MonthBounds::new(2025, 0),
            Err(DashboardError::InvalidDate(_))
        ));
    }

    #[test]
    fn single_day_resolves_to_one_day_interval() {
        let range = resolve(&Query::SingleDay {
            day: "2025-10-27".to_string(),
        })
        .unwrap();
        assert_eq!(range.interval.from, ymd(2025, 10, 27));
        assert_eq!(range.interval.to, ymd(2025, 10, 27));
        assert_eq!(range.fetch_bounds(), (ymd(2025, 10, 27), ymd(2025, 10, 28)));
    }

    #[test]
    fn custom_range_rejects_inverted_bounds() {
        let err = resolve(&Query::CustomRange {
            from: "2025-10-28".to_string(),
            to: "2025-10-27".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[test]
    fn malformed_dates_are_invalid() {
        for input in ["2025-1-05", "27/10/2025", "", "2025-02-30", "abcd-ef-gh"] {
            assert!(
                matches!(parse_ymd(input), Err(DashboardError::InvalidDate(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn parse_ignores_time_suffix() {
        assert_eq!(parse_ymd("2025-10-27T13:40:00").unwrap(), ymd(2025, 10, 27));
    }

    #[test]
    fn month_range_admits_only_its_days() {
        let range = resolve(&Query::CalendarMonth {
            year: 2025,
            month: 10,
        })
        .unwrap();
        assert!(range.admits(ymd(2025, 10, 1)));
        assert!(range.admits(ymd(2025, 10, 31)));
        assert!(!range.admits(ymd(2025, 11, 1)));
        assert!(!range.admits(ymd(2025, 9, 30)));
    }
}
