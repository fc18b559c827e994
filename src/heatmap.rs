//! Hour-of-day by day-of-week event counts for the volume heatmap.

use chrono::NaiveDate;
use serde::Serialize;
use std::ops::RangeInclusive;

use crate::models::Event;

pub const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// 24 hour rows by 7 day-of-week columns, every cell present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourByDay {
    cells: [[u64; 7]; 24],
}

/// Presentation grid: days as rows, the selected hours as columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapGrid {
    pub days: Vec<String>,
    pub hours: Vec<u32>,
    pub cells: Vec<Vec<u64>>,
    pub max: u64,
}

/// Count events per (hour, day-of-week), optionally for one zip code only
pub fn hour_by_day_counts(events: &[Event], zip_filter: Option<&str>) -> HourByDay {
    let mut cells = [[0u64; 7]; 24];
    for event in events {
        if zip_filter.is_some_and(|zip| event.zipcode != zip) {
            continue;
        }
        cells[event.hour() as usize][event.day_of_week() as usize] += 1;
    }
    HourByDay { cells }
}

/// Events whose local date falls in `[start, end]`
pub fn events_between(events: &[Event], start: NaiveDate, end: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|e| {
            let date = e.date();
            date >= start && date <= end
        })
        .cloned()
        .collect()
}

impl HourByDay {
    /// Hour rows, each with seven day-of-week counts
    pub fn rows(&self) -> &[[u64; 7]; 24] {
        &self.cells
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    /// Transposed: seven day rows of 24 hourly counts
    pub fn by_day(&self) -> [[u64; 24]; 7] {
        let mut out = [[0u64; 24]; 7];
        for (hour, row) in self.cells.iter().enumerate() {
            for (day, count) in row.iter().enumerate() {
                out[day][hour] = *count;
            }
        }
        out
    }

    /// Days-as-rows grid limited to `hours` (clamped to 0..=23)
    pub fn grid(&self, hours: RangeInclusive<u32>) -> HeatmapGrid {
        let hours: Vec<u32> = hours.filter(|h| *h < 24).collect();
        let by_day = self.by_day();
        let cells: Vec<Vec<u64>> = by_day
            .iter()
            .map(|day| hours.iter().map(|h| day[*h as usize]).collect())
            .collect();
        let max = cells.iter().flatten().copied().max().unwrap_or(0);

        HeatmapGrid {
            days: DAY_LABELS.iter().map(|d| d.to_string()).collect(),
            hours,
            cells,
            max,
        }
    }
}
