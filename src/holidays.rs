//! US federal holiday calendar (observed dates)

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// How a fixed-date holiday moves when it lands on a weekend
#[derive(Debug, Clone, Copy)]
enum Observance {
    /// Saturday moves to Friday, Sunday to Monday
    NearestWorkday,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Fixed { month: u32, day: u32, observance: Observance },
    /// `n`th weekday of the month, 1-based
    NthWeekday { month: u32, weekday: Weekday, n: u8 },
    LastWeekday { month: u32, weekday: Weekday },
}

struct HolidayDef {
    name: &'static str,
    rule: Rule,
    first_year: Option<i32>,
}

fn get_holiday_definitions() -> Vec<HolidayDef> {
    use Observance::NearestWorkday;
    vec![
        HolidayDef {
            name: "New Year's Day",
            rule: Rule::Fixed { month: 1, day: 1, observance: NearestWorkday },
            first_year: None,
        },
        HolidayDef {
            name: "Martin Luther King Jr. Day",
            rule: Rule::NthWeekday { month: 1, weekday: Weekday::Mon, n: 3 },
            first_year: Some(1986),
        },
        HolidayDef {
            name: "Presidents Day",
            rule: Rule::NthWeekday { month: 2, weekday: Weekday::Mon, n: 3 },
            first_year: None,
        },
        HolidayDef {
            name: "Memorial Day",
            rule: Rule::LastWeekday { month: 5, weekday: Weekday::Mon },
            first_year: None,
        },
        HolidayDef {
            name: "Juneteenth",
            rule: Rule::Fixed { month: 6, day: 19, observance: NearestWorkday },
            first_year: Some(2021),
        },
        HolidayDef {
            name: "Independence Day",
            rule: Rule::Fixed { month: 7, day: 4, observance: NearestWorkday },
            first_year: None,
        },
        HolidayDef {
            name: "Labor Day",
            rule: Rule::NthWeekday { month: 9, weekday: Weekday::Mon, n: 1 },
            first_year: None,
        },
        HolidayDef {
            name: "Columbus Day",
            rule: Rule::NthWeekday { month: 10, weekday: Weekday::Mon, n: 2 },
            first_year: None,
        },
        HolidayDef {
            name: "Veterans Day",
            rule: Rule::Fixed { month: 11, day: 11, observance: NearestWorkday },
            first_year: None,
        },
        HolidayDef {
            name: "Thanksgiving",
            rule: Rule::NthWeekday { month: 11, weekday: Weekday::Thu, n: 4 },
            first_year: None,
        },
        HolidayDef {
            name: "Christmas",
            rule: Rule::Fixed { month: 12, day: 25, observance: NearestWorkday },
            first_year: None,
        },
    ]
}

fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

impl Rule {
    fn date_in(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            Rule::Fixed { month, day, observance } => {
                let date = NaiveDate::from_ymd_opt(year, month, day)?;
                match observance {
                    Observance::NearestWorkday => Some(nearest_workday(date)),
                }
            }
            Rule::NthWeekday { month, weekday, n } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            }
            Rule::LastWeekday { month, weekday } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5)
                    .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4))
            }
        }
    }
}

/// Observed federal holidays in `[start, end]`, with names
pub fn federal_holidays_named(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, &'static str)> {
    if start > end {
        return Vec::new();
    }

    // Observed New Year's Day can fall on Dec 31 of the prior year
    let mut out = Vec::new();
    for year in start.year() - 1..=end.year() + 1 {
        for def in get_holiday_definitions() {
            if def.first_year.is_some_and(|first| year < first) {
                continue;
            }
            if let Some(date) = def.rule.date_in(year) {
                if date >= start && date <= end {
                    out.push((date, def.name));
                }
            }
        }
    }
    out.sort_by_key(|(date, _)| *date);
    out
}

/// Observed federal holidays in `[start, end]`
pub fn federal_holidays(start: NaiveDate, end: NaiveDate) -> BTreeSet<NaiveDate> {
    federal_holidays_named(start, end)
        .into_iter()
        .map(|(date, _)| date)
        .collect()
}
