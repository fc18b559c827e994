//! Dashboard service shared by the REST handlers and the CLI tools.
//!
//! Holds only the store handle and the configuration. Every call reloads the
//! events it needs and recomputes its result.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::calendar::build_calendar;
use crate::config::DashboardConfig;
use crate::counts::{count_by_day, CountTable, ZipSelection};
use crate::db::{self, DbConn};
use crate::error::{DashboardError, Result};
use crate::features::{build_features, load_feature_list};
use crate::forecast::{fit_and_forecast, Prediction};
use crate::heatmap::{events_between, hour_by_day_counts, HeatmapGrid};
use crate::models::{Event, StopType};
use crate::summary::{summarize_zips, ZipSummary};

#[derive(Debug, Clone)]
pub struct HeatmapRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub zips: ZipSelection,
    pub stop: StopType,
}

#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub date: NaiveDate,
    pub zips: ZipSelection,
    pub stop: StopType,
}

/// Fitted series plus the value for the requested day
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub date: NaiveDate,
    /// Rounded to one decimal
    pub predicted: f64,
    pub train: Vec<Prediction>,
    pub forecast: Vec<Prediction>,
    pub intercept: f64,
    pub r_squared: f64,
    pub coefficients: Vec<(String, f64)>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Events restricted to the selected zip codes; each named zip must occur.
fn filter_zips(events: &[Event], zips: &ZipSelection) -> Result<Vec<Event>> {
    match zips {
        ZipSelection::All => Ok(events.to_vec()),
        ZipSelection::Zips(list) => {
            let present: HashSet<&str> = events.iter().map(|e| e.zipcode.as_str()).collect();
            if let Some(missing) = list.iter().find(|z| !present.contains(z.as_str())) {
                return Err(DashboardError::UnknownZip(missing.clone()));
            }
            let wanted: HashSet<&str> = list.iter().map(String::as_str).collect();
            Ok(events
                .iter()
                .filter(|e| wanted.contains(e.zipcode.as_str()))
                .cloned()
                .collect())
        }
    }
}

/// Heatmap grid for already-loaded events of the requested service type
pub fn heatmap_from_events(
    events: &[Event],
    req: &HeatmapRequest,
    config: &DashboardConfig,
) -> Result<HeatmapGrid> {
    if req.start > req.end {
        return Err(DashboardError::InvalidRange {
            start: req.start,
            end: req.end,
        });
    }
    let selected = filter_zips(events, &req.zips)?;
    let in_range = events_between(&selected, req.start, req.end);
    debug!(events = in_range.len(), "heatmap window");
    Ok(hour_by_day_counts(&in_range, None).grid(config.heatmap_hours()))
}

/// Fit over the configured training window and project to the horizon.
///
/// Blackout days are interpolated in the target before fitting.
pub fn forecast_from_events(
    events: &[Event],
    req: &PredictRequest,
    config: &DashboardConfig,
    feature_names: &[String],
) -> Result<PredictionReport> {
    let window = config.window();
    let train_calendar = build_calendar(window.train_start, window.train_end)?;
    let counts = count_by_day(events, &train_calendar, None)?;
    let mut series = counts.select(&req.zips)?;
    series.interpolate(&config.blackout_dates)?;

    let calendar = build_calendar(window.train_start, window.forecast_end)?;
    let features = build_features(&calendar)?;
    let forecast = fit_and_forecast(&series, &calendar, &features, feature_names, &window)?;

    let predicted = forecast
        .prediction_on(req.date)
        .ok_or(DashboardError::UnknownDate(req.date))?;

    let model = &forecast.model;
    let coefficients = model
        .feature_names()
        .iter()
        .cloned()
        .zip(model.coefficients().iter().copied())
        .collect();

    Ok(PredictionReport {
        date: req.date,
        predicted: round1(predicted),
        intercept: model.intercept(),
        r_squared: model.r_squared(),
        coefficients,
        train: forecast.train,
        forecast: forecast.forecast,
    })
}

pub struct DashboardService {
    db: DbConn,
    config: DashboardConfig,
}

impl DashboardService {
    pub fn new(db: DbConn, config: DashboardConfig) -> Self {
        Self { db, config }
    }

    /// Open the store named in `config` and make sure the schema exists
    pub async fn connect(config: DashboardConfig) -> Result<Self> {
        info!("Opening event store at {}", config.db_path);
        let db = db::connect(&config.db_path).await?;
        db::init_schema(&db).await?;
        Ok(Self::new(db, config))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn db(&self) -> &DbConn {
        &self.db
    }

    pub async fn events(&self, stop: StopType) -> Result<Vec<Event>> {
        db::load_events(&self.db, stop).await
    }

    pub async fn heatmap(&self, req: &HeatmapRequest) -> Result<HeatmapGrid> {
        let events = self.events(req.stop).await?;
        heatmap_from_events(&events, req, &self.config)
    }

    pub async fn predict(&self, req: &PredictRequest) -> Result<PredictionReport> {
        let path = self.config.feature_lists.for_stop(req.stop);
        let feature_names = load_feature_list(path)?;
        let events = self.events(req.stop).await?;
        forecast_from_events(&events, req, &self.config, &feature_names)
    }

    /// Daily per-zip counts over the training window
    pub async fn counts(&self, stop: StopType) -> Result<CountTable> {
        let events = self.events(stop).await?;
        let calendar = build_calendar(self.config.train_start, self.config.train_end)?;
        count_by_day(&events, &calendar, None)
    }

    pub async fn zip_summary(&self) -> Result<Vec<ZipSummary>> {
        let pickups = self.events(StopType::Pickups).await?;
        let deliveries = self.events(StopType::Deliveries).await?;
        let combined: Vec<Event> = pickups.iter().chain(&deliveries).cloned().collect();

        let calendar = build_calendar(self.config.train_start, self.config.train_end)?;
        let p = count_by_day(&pickups, &calendar, None)?;
        let d = count_by_day(&deliveries, &calendar, None)?;
        let c = count_by_day(&combined, &calendar, None)?;

        Ok(summarize_zips(&calendar, &p, &d, &c, &pickups, &deliveries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use chrono::{Datelike, Duration, NaiveDateTime};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, 0, 0).unwrap()
    }

    /// Weekday-driven volume for two zips across the whole training window
    fn weekly_events(config: &DashboardConfig) -> Vec<Event> {
        let per_weekday = [3, 5, 5, 4, 4, 1, 0];
        let mut events = Vec::new();
        let mut date = config.train_start;
        while date <= config.train_end {
            let n = per_weekday[date.weekday().num_days_from_monday() as usize];
            for i in 0..n {
                events.push(Event::new(EventKind::Pickup, "94110", at(date, 9 + i)));
            }
            events.push(Event::new(EventKind::Delivery, "94103", at(date, 14)));
            date += Duration::days(1);
        }
        events
    }

    fn dow_features() -> Vec<String> {
        (0..6).map(|d| format!("dayofweek_{}", d)).collect()
    }

    #[test]
    fn test_forecast_follows_weekday_pattern() {
        let config = DashboardConfig::default();
        let events = weekly_events(&config);
        let req = PredictRequest {
            // a Wednesday
            date: ymd(2015, 11, 11),
            zips: ZipSelection::parse("94110").unwrap(),
            stop: StopType::Pickups,
        };

        let report = forecast_from_events(&events, &req, &config, &dow_features()).unwrap();
        assert_eq!(report.predicted, 5.0);
        assert_eq!(report.train.len(), 212);
        assert_eq!(report.forecast.first().map(|p| p.date), Some(config.train_end));
        assert_eq!(report.forecast.last().map(|p| p.date), Some(config.forecast_end));
        assert_eq!(report.coefficients.len(), 6);
    }

    #[test]
    fn test_forecast_unknown_zip_and_date() {
        let config = DashboardConfig::default();
        let events = weekly_events(&config);

        let req = PredictRequest {
            date: ymd(2015, 11, 11),
            zips: ZipSelection::parse("10001").unwrap(),
            stop: StopType::PickupsAndDeliveries,
        };
        let err = forecast_from_events(&events, &req, &config, &dow_features()).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownZip(z) if z == "10001"));

        let req = PredictRequest {
            date: ymd(2016, 2, 1),
            zips: ZipSelection::All,
            stop: StopType::PickupsAndDeliveries,
        };
        let err = forecast_from_events(&events, &req, &config, &dow_features()).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownDate(_)));
    }

    #[test]
    fn test_heatmap_window_and_zip() {
        let config = DashboardConfig::default();
        let events = weekly_events(&config);

        // Monday 2015-03-02 .. Sunday 2015-03-08
        let req = HeatmapRequest {
            start: ymd(2015, 3, 2),
            end: ymd(2015, 3, 8),
            zips: ZipSelection::parse("94103").unwrap(),
            stop: StopType::PickupsAndDeliveries,
        };
        let grid = heatmap_from_events(&events, &req, &config).unwrap();
        assert_eq!(grid.cells.len(), 7);
        // 14:00 is column 7 of the 7..=18 window
        assert!(grid.cells.iter().all(|day| day[7] == 1));
        assert_eq!(grid.max, 1);

        let reversed = HeatmapRequest {
            start: ymd(2015, 3, 8),
            end: ymd(2015, 3, 2),
            ..req.clone()
        };
        assert!(matches!(
            heatmap_from_events(&events, &reversed, &config),
            Err(DashboardError::InvalidRange { .. })
        ));

        let unknown = HeatmapRequest {
            zips: ZipSelection::parse("94110,99999").unwrap(),
            ..req
        };
        assert!(matches!(
            heatmap_from_events(&events, &unknown, &config),
            Err(DashboardError::UnknownZip(z)) if z == "99999"
        ));
    }
}
