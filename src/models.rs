use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use tracing::warn;

use crate::error::{DashboardError, Result};

/// Canonical day key used to join calendars, counts and predictions
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Local timestamp format used in the store
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw record from CSV ingestion
#[derive(Debug, Deserialize)]
pub struct CsvRecord {
    pub timestamp: String,
    pub zipcode: String,
    #[serde(default)]
    pub value_cents: Option<i64>,
}

/// Pickup (submission) or delivery (order)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pickup,
    Delivery,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pickup => "pickup",
            EventKind::Delivery => "delivery",
        }
    }
}

/// Service type selected on the dashboard
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StopType {
    Pickups,
    Deliveries,
    #[default]
    PickupsAndDeliveries,
}

impl StopType {
    pub const ALL: [StopType; 3] = [
        StopType::Pickups,
        StopType::Deliveries,
        StopType::PickupsAndDeliveries,
    ];

    /// Event kinds aggregated for this service type
    pub fn kinds(&self) -> &'static [EventKind] {
        match self {
            StopType::Pickups => &[EventKind::Pickup],
            StopType::Deliveries => &[EventKind::Delivery],
            StopType::PickupsAndDeliveries => &[EventKind::Pickup, EventKind::Delivery],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StopType::Pickups => "Pickups",
            StopType::Deliveries => "Deliveries",
            StopType::PickupsAndDeliveries => "Pickups and Deliveries",
        }
    }
}

impl fmt::Display for StopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StopType {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pickups" | "pickup" => Ok(StopType::Pickups),
            "deliveries" | "delivery" => Ok(StopType::Deliveries),
            "pickups and deliveries" | "both" | "all" => Ok(StopType::PickupsAndDeliveries),
            other => Err(DashboardError::InvalidInput(format!(
                "unknown service type '{}', expected Pickups, Deliveries or Pickups and Deliveries",
                other
            ))),
        }
    }
}

/// A single pickup or delivery, timestamp already in the local zone
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub zipcode: String,
    pub local_time: NaiveDateTime,
    pub value_cents: Option<i64>,
}

impl Event {
    pub fn new(kind: EventKind, zipcode: impl Into<String>, local_time: NaiveDateTime) -> Self {
        Self {
            kind,
            zipcode: zipcode.into(),
            local_time,
            value_cents: None,
        }
    }

    pub fn with_value(mut self, cents: i64) -> Self {
        self.value_cents = Some(cents);
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.local_time.date()
    }

    pub fn date_key(&self) -> String {
        self.local_time.format(DATE_KEY_FORMAT).to_string()
    }

    pub fn hour(&self) -> u32 {
        self.local_time.hour()
    }

    /// 0 = Monday .. 6 = Sunday
    pub fn day_of_week(&self) -> u32 {
        self.local_time.weekday().num_days_from_monday()
    }
}

/// Event row as persisted in SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub kind: EventKind,
    pub zipcode: String,
    pub local_ts: String,
    #[serde(default)]
    pub value_cents: Option<i64>,
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            kind: e.kind,
            zipcode: e.zipcode.clone(),
            local_ts: e.local_time.format(TIMESTAMP_FORMAT).to_string(),
            value_cents: e.value_cents,
        }
    }
}

impl EventRow {
    pub fn to_event(&self) -> Result<Event> {
        let local_time = NaiveDateTime::parse_from_str(&self.local_ts, TIMESTAMP_FORMAT)
            .map_err(|e| DashboardError::InvalidInput(format!("bad stored timestamp '{}': {}", self.local_ts, e)))?;
        Ok(Event {
            kind: self.kind,
            zipcode: self.zipcode.clone(),
            local_time,
            value_cents: self.value_cents,
        })
    }
}

impl CsvRecord {
    /// Convert to an event, moving the UTC timestamp into `tz`
    pub fn to_event(&self, kind: EventKind, tz: Tz) -> Result<Event> {
        let utc = parse_utc_timestamp(&self.timestamp)?;
        let zipcode = normalize_zipcode(&self.zipcode);
        if zipcode.is_empty() {
            return Err(DashboardError::InvalidInput("empty zipcode".to_string()));
        }

        Ok(Event {
            kind,
            zipcode,
            local_time: utc.with_timezone(&tz).naive_local(),
            value_cents: self.value_cents,
        })
    }
}

/// Zip codes exported through float columns come back as "94110.0"
pub fn normalize_zipcode(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Parse an RFC 3339 timestamp, or a naive one taken as UTC
pub fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(DashboardError::InvalidInput(format!("unparseable timestamp '{}'", raw)))
}

/// Dates typed into the dashboard forms: `2015-01-05` or `1/5/2015`
pub fn parse_user_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_KEY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| DashboardError::InvalidInput(format!("unparseable date '{}'", raw)))
}

/// Events parsed from one CSV export plus the rows that were skipped
#[derive(Debug, Default)]
pub struct CsvLoad {
    pub events: Vec<Event>,
    pub skipped: usize,
}

/// Read `timestamp,zipcode[,value_cents]` rows as events of `kind`.
///
/// Unparseable rows are skipped and counted; only the first five are logged.
pub fn read_csv_events<R: Read>(reader: R, kind: EventKind, tz: Tz) -> Result<CsvLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut load = CsvLoad::default();
    for (i, record) in reader.deserialize::<CsvRecord>().enumerate() {
        let parsed = record
            .map_err(DashboardError::from)
            .and_then(|r| r.to_event(kind, tz));
        match parsed {
            Ok(event) => load.events.push(event),
            Err(e) => {
                if load.skipped < 5 {
                    warn!("Skipping {} row {}: {}", kind.as_str(), i + 1, e);
                }
                load.skipped += 1;
            }
        }
    }
    Ok(load)
}
