//! Calendar design matrix for the volume regression.
//!
//! Every column is derived from a calendar row alone, so the matrix for a
//! given calendar is always the same. Column names are what a persisted
//! feature list refers to.

use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use crate::calendar::{Calendar, CalendarRow};
use crate::error::{DashboardError, Result};
use crate::holidays::federal_holidays;

/// Named numeric columns, one value per calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    rows: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FeatureMatrix {
    fn with_rows(rows: usize) -> Self {
        Self {
            rows,
            names: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn push(&mut self, name: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.rows);
        let name = name.into();
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(values);
    }

    fn push_flags(&mut self, name: impl Into<String>, flags: &[bool]) {
        self.push(name, flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect());
    }

    /// Number of rows (calendar days)
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Restrict to exactly `names`, in that order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureMatrix> {
        let mut out = FeatureMatrix::with_rows(self.rows);
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| DashboardError::UnknownFeature(name.to_string()))?;
            out.push(name, column.to_vec());
        }
        Ok(out)
    }

    /// Values of one row across all columns
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row]).collect()
    }
}

/// Week-of-month bucket: 1 for days 1-7, 2 for 8-15, 3 for 16-22, 4 from 23
pub fn week_bucket(day_of_month: u32) -> u8 {
    match day_of_month {
        0..=7 => 1,
        8..=15 => 2,
        16..=22 => 3,
        _ => 4,
    }
}

/// Flag runs of three consecutive off days (weekend or holiday).
///
/// Windows start at index 1 through `len - 3`; every day of a matching
/// window is flagged.
pub fn long_weekend_flags(off_days: &[bool]) -> Vec<bool> {
    let mut flags = vec![false; off_days.len()];
    for i in 1..off_days.len().saturating_sub(2) {
        if off_days[i] && off_days[i + 1] && off_days[i + 2] {
            flags[i..=i + 2].fill(true);
        }
    }
    flags
}

fn flags_where(rows: &[CalendarRow], pred: impl Fn(&CalendarRow) -> bool) -> Vec<bool> {
    rows.iter().map(pred).collect()
}

fn and(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| *x && *y).collect()
}

/// Build the full calendar design matrix
pub fn build_features(calendar: &Calendar) -> Result<FeatureMatrix> {
    let (Some(start), Some(end)) = (calendar.start(), calendar.end()) else {
        return Err(DashboardError::EmptyRange("calendar has no rows".to_string()));
    };
    let rows = calendar.rows();
    let mut m = FeatureMatrix::with_rows(rows.len());

    m.push(
        "dayssincestart",
        rows.iter().map(|r| r.days_since_start as f64).collect(),
    );

    for dow in 0..7 {
        m.push_flags(format!("dayofweek_{}", dow), &flags_where(rows, |r| r.day_of_week == dow));
    }

    let days_present: BTreeSet<u32> = rows.iter().map(|r| r.day_of_month).collect();
    for dom in days_present {
        m.push_flags(format!("dayofmonth_{}", dom), &flags_where(rows, |r| r.day_of_month == dom));
    }

    let weeks: Vec<Vec<bool>> = (1..=4)
        .map(|k| flags_where(rows, |r| week_bucket(r.day_of_month) == k))
        .collect();
    for (k, flags) in weeks.iter().enumerate() {
        m.push_flags(format!("week{}", k + 1), flags);
    }

    let weekend = flags_where(rows, |r| r.day_of_week == 5 || r.day_of_week == 6);
    let tueswed = flags_where(rows, |r| r.day_of_week == 1 || r.day_of_week == 2);
    let frisat = flags_where(rows, |r| r.day_of_week == 4 || r.day_of_week == 5);
    m.push_flags("isweekend", &weekend);
    m.push_flags("istueswed", &tueswed);
    m.push_flags("isfrisat", &frisat);

    let holidays = federal_holidays(start, end);
    let holiday = flags_where(rows, |r| holidays.contains(&r.date));
    let off_days: Vec<bool> = weekend.iter().zip(&holiday).map(|(w, h)| *w || *h).collect();
    m.push_flags("x_isholiday", &holiday);
    m.push_flags("x_isholidaywknd", &long_weekend_flags(&off_days));

    for (suffix, flags) in [("tueswed", &tueswed), ("frisat", &frisat), ("wknd", &weekend)] {
        for (k, week) in weeks.iter().enumerate() {
            m.push_flags(format!("week{}{}", k + 1, suffix), &and(week, flags));
        }
    }

    Ok(m)
}

/// Read a persisted feature list: CSV with a `var` column
pub fn parse_feature_list<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.trim() == "var")
        .ok_or_else(|| DashboardError::InvalidInput("feature list has no 'var' column".to_string()))?;

    let mut names = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(name) = record.get(column).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }

    if names.is_empty() {
        return Err(DashboardError::InvalidInput("feature list is empty".to_string()));
    }
    Ok(names)
}

pub fn load_feature_list(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    parse_feature_list(file)
}
