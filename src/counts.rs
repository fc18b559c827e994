//! Daily per-zip event counts, zero-filled against a calendar.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::calendar::Calendar;
use crate::error::{DashboardError, Result};
use crate::models::Event;

/// Days x zip codes. Every calendar day has a row; columns are the zip codes
/// seen in the source events, ordered by zip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountTable {
    dates: Vec<NaiveDate>,
    keys: Vec<String>,
    columns: BTreeMap<String, Vec<u64>>,
}

/// Count events per day and zip code in a single pass.
///
/// With `group` set, only that zip code is counted and it becomes the only
/// column. Days without events are present with a zero count; events dated
/// outside the calendar are not counted.
pub fn count_by_day(events: &[Event], calendar: &Calendar, group: Option<&str>) -> Result<CountTable> {
    let n = calendar.len();
    let mut columns: BTreeMap<String, Vec<u64>> = BTreeMap::new();

    match group {
        Some(zip) => {
            if !events.iter().any(|e| e.zipcode == zip) {
                return Err(DashboardError::UnknownGroupField(zip.to_string()));
            }
            columns.insert(zip.to_string(), vec![0; n]);
        }
        None => {
            for event in events {
                if !columns.contains_key(&event.zipcode) {
                    columns.insert(event.zipcode.clone(), vec![0; n]);
                }
            }
        }
    }

    for event in events {
        let Some(row) = calendar.position(event.date()) else {
            continue;
        };
        if let Some(counts) = columns.get_mut(&event.zipcode) {
            counts[row] += 1;
        }
    }

    Ok(CountTable {
        dates: calendar.rows().iter().map(|r| r.date).collect(),
        keys: calendar.keys().map(str::to_string).collect(),
        columns,
    })
}

impl CountTable {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Canonical `YYYY-MM-DD` row keys
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn zipcodes(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<u64>> {
        &self.columns
    }

    pub fn column(&self, zip: &str) -> Option<&[u64]> {
        self.columns.get(zip).map(Vec::as_slice)
    }

    pub fn total(&self) -> u64 {
        self.columns.values().flat_map(|c| c.iter()).sum()
    }

    /// Sum across all zip codes for each day
    pub fn daily_totals(&self) -> Vec<u64> {
        let mut totals = vec![0; self.len()];
        for counts in self.columns.values() {
            for (t, c) in totals.iter_mut().zip(counts) {
                *t += c;
            }
        }
        totals
    }

    /// Per-zip totals over every row
    pub fn column_totals(&self) -> BTreeMap<String, u64> {
        self.tail_totals(self.len())
    }

    /// Per-zip totals over the last `days` rows
    pub fn tail_totals(&self, days: usize) -> BTreeMap<String, u64> {
        let from = self.len().saturating_sub(days);
        self.columns
            .iter()
            .map(|(zip, counts)| (zip.clone(), counts[from..].iter().sum()))
            .collect()
    }

    /// Target series for the forecaster: selected zip columns summed per day
    pub fn select(&self, selection: &ZipSelection) -> Result<DailySeries> {
        let values: Vec<f64> = match selection {
            ZipSelection::All => self.daily_totals().into_iter().map(|v| v as f64).collect(),
            ZipSelection::Zips(zips) => {
                let mut values = vec![0.0; self.len()];
                for zip in zips {
                    let counts = self
                        .column(zip)
                        .ok_or_else(|| DashboardError::UnknownZip(zip.clone()))?;
                    for (v, c) in values.iter_mut().zip(counts) {
                        *v += *c as f64;
                    }
                }
                values
            }
        };

        Ok(DailySeries {
            dates: self.dates.clone(),
            values,
        })
    }

    /// Write as CSV: a `daterange_str` column then one column per zip
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["daterange_str".to_string()];
        header.extend(self.columns.keys().cloned());
        wtr.write_record(&header)?;

        for (row, key) in self.keys.iter().enumerate() {
            let mut record = vec![key.clone()];
            record.extend(self.columns.values().map(|c| c[row].to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Which zip codes make up a forecast target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipSelection {
    All,
    Zips(Vec<String>),
}

impl ZipSelection {
    /// `"all"` or a comma-separated list such as `"94110,94103"`
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(ZipSelection::All);
        }

        let zips: Vec<String> = raw.split(',').map(|z| z.trim().to_string()).collect();
        if zips.iter().any(String::is_empty) {
            return Err(DashboardError::InvalidInput(format!("malformed zip list '{}'", raw)));
        }
        Ok(ZipSelection::Zips(zips))
    }

    /// Single-zip filter for counting, if exactly one zip is selected
    pub fn single(&self) -> Option<&str> {
        match self {
            ZipSelection::Zips(zips) if zips.len() == 1 => Some(zips[0].as_str()),
            _ => None,
        }
    }
}

/// Date-aligned numeric series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl DailySeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(DashboardError::InvalidInput(format!(
                "{} dates for {} values",
                dates.len(),
                values.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DashboardError::InvalidInput("series dates must ascend".to_string()));
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates.binary_search(&date).ok().map(|i| self.values[i])
    }

    /// Replace the values on `dates` by linear interpolation between their
    /// nearest observed neighbours. Leading gaps take the first observed
    /// value and trailing gaps the last one.
    pub fn interpolate(&mut self, dates: &[NaiveDate]) -> Result<()> {
        let mut missing = vec![false; self.len()];
        for date in dates {
            if let Ok(i) = self.dates.binary_search(date) {
                missing[i] = true;
            }
        }

        let observed: Vec<usize> = (0..self.len()).filter(|i| !missing[*i]).collect();
        let (Some(&first), Some(&last)) = (observed.first(), observed.last()) else {
            return Err(DashboardError::EmptyRange("no observed values to interpolate from".to_string()));
        };

        for i in 0..first {
            self.values[i] = self.values[first];
        }
        for i in last + 1..self.len() {
            self.values[i] = self.values[last];
        }
        for pair in observed.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if hi - lo < 2 {
                continue;
            }
            let step = (self.values[hi] - self.values[lo]) / (hi - lo) as f64;
            for i in lo + 1..hi {
                self.values[i] = self.values[lo] + step * (i - lo) as f64;
            }
        }
        Ok(())
    }
}
