//! Date reference table: one row per calendar day with derived fields.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::ops::Range;

use crate::error::{DashboardError, Result};
use crate::models::{Event, DATE_KEY_FORMAT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarRow {
    pub date: NaiveDate,
    pub key: String,
    pub day_of_month: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    /// ISO week of year
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub day_of_year: u32,
    pub days_since_start: usize,
}

impl CalendarRow {
    fn new(date: NaiveDate, days_since_start: usize) -> Self {
        Self {
            date,
            key: date.format(DATE_KEY_FORMAT).to_string(),
            day_of_month: date.day(),
            day_of_week: date.weekday().num_days_from_monday(),
            week: date.iso_week().week(),
            month: date.month(),
            year: date.year(),
            day_of_year: date.ordinal(),
            days_since_start,
        }
    }
}

/// Contiguous, ascending run of days
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Calendar {
    rows: Vec<CalendarRow>,
}

/// One row per day in `[min_date, max_date]`, both ends included.
pub fn build_calendar(min_date: NaiveDate, max_date: NaiveDate) -> Result<Calendar> {
    if min_date > max_date {
        return Err(DashboardError::InvalidRange {
            start: min_date,
            end: max_date,
        });
    }

    let rows = min_date
        .iter_days()
        .take_while(|d| *d <= max_date)
        .enumerate()
        .map(|(offset, date)| CalendarRow::new(date, offset))
        .collect();

    Ok(Calendar { rows })
}

impl Calendar {
    /// Calendar covering the earliest through latest event date
    pub fn spanning(events: &[Event]) -> Result<Calendar> {
        let min = events.iter().map(Event::date).min();
        let max = events.iter().map(Event::date).max();
        match (min, max) {
            (Some(min), Some(max)) => build_calendar(min, max),
            _ => Err(DashboardError::EmptyRange("no events to span".to_string())),
        }
    }

    pub fn rows(&self) -> &[CalendarRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }

    /// Row index of `date`, computed from the offset to the first day
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        let start = self.start()?;
        let offset = date.signed_duration_since(start).num_days();
        if offset < 0 || offset as usize >= self.rows.len() {
            return None;
        }
        Some(offset as usize)
    }

    /// Row range for the inclusive window `[start, end]`
    pub fn range_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Range<usize>> {
        if start > end {
            return Err(DashboardError::InvalidRange { start, end });
        }
        let first = self.position(start).ok_or(DashboardError::UnknownDate(start))?;
        let last = self.position(end).ok_or(DashboardError::UnknownDate(end))?;
        Ok(first..last + 1)
    }

    /// Last `n` days (all of them when shorter)
    pub fn tail(&self, n: usize) -> &[CalendarRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_row_count_matches_inclusive_span() {
        let cases = [
            (ymd(2015, 1, 1), ymd(2015, 1, 1)),
            (ymd(2015, 1, 1), ymd(2015, 7, 31)),
            (ymd(2015, 12, 20), ymd(2016, 3, 2)),
        ];
        for (a, b) in cases {
            let cal = build_calendar(a, b).unwrap();
            assert_eq!(cal.len() as i64, (b - a).num_days() + 1);
            assert!(cal.rows().windows(2).all(|w| w[0].date < w[1].date));
            assert_eq!(cal.start(), Some(a));
            assert_eq!(cal.end(), Some(b));
        }
    }

    #[test]
    fn test_reversed_range_fails() {
        let err = build_calendar(ymd(2015, 2, 1), ymd(2015, 1, 1)).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[test]
    fn test_derived_fields() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 1, 5)).unwrap();
        let first = &cal.rows()[0];
        assert_eq!(first.key, "2015-01-01");
        assert_eq!(first.day_of_week, 3); // Thursday
        assert_eq!(first.week, 1);
        assert_eq!(first.day_of_year, 1);
        assert_eq!(first.days_since_start, 0);

        let last = &cal.rows()[4];
        assert_eq!(last.key, "2015-01-05");
        assert_eq!(last.day_of_week, 0); // Monday
        assert_eq!(last.week, 2);
        assert_eq!(last.days_since_start, 4);
    }

    #[test]
    fn test_range_between_and_position() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 12, 31)).unwrap();
        assert_eq!(cal.position(ymd(2015, 2, 1)), Some(31));
        assert_eq!(cal.position(ymd(2016, 1, 1)), None);

        let range = cal.range_between(ymd(2015, 6, 30), ymd(2015, 7, 31)).unwrap();
        assert_eq!(range.len(), 32);
        assert_eq!(cal.rows()[range.start].key, "2015-06-30");

        assert!(cal.range_between(ymd(2015, 7, 1), ymd(2015, 6, 1)).is_err());
        assert!(matches!(
            cal.range_between(ymd(2014, 12, 1), ymd(2015, 1, 2)),
            Err(DashboardError::UnknownDate(_))
        ));
    }

    #[test]
    fn test_tail_takes_last_days() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 1, 31)).unwrap();
        assert_eq!(cal.tail(3)[0].key, "2015-01-29");
        assert_eq!(cal.tail(3)[0].days_since_start, 28);
        assert_eq!(cal.tail(100).len(), 31);
    }
}
