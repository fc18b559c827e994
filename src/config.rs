//! Dashboard configuration.
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::error::{DashboardError, Result};
use crate::forecast::ForecastWindow;
use crate::models::StopType;

pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Persisted feature subsets, one CSV per service type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureListPaths {
    pub pickups: PathBuf,
    pub deliveries: PathBuf,
    pub combined: PathBuf,
}

impl Default for FeatureListPaths {
    fn default() -> Self {
        Self {
            pickups: PathBuf::from("data/features_pickups.csv"),
            deliveries: PathBuf::from("data/features_deliveries.csv"),
            combined: PathBuf::from("data/features_combined.csv"),
        }
    }
}

impl FeatureListPaths {
    pub fn for_stop(&self, stop: StopType) -> &Path {
        match stop {
            StopType::Pickups => &self.pickups,
            StopType::Deliveries => &self.deliveries,
            StopType::PickupsAndDeliveries => &self.combined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub db_path: String,
    /// IANA zone events are normalised into
    pub timezone: String,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub forecast_end: NaiveDate,
    /// Days whose counts are interpolated before fitting
    pub blackout_dates: Vec<NaiveDate>,
    pub feature_lists: FeatureListPaths,
    pub heatmap_first_hour: u32,
    pub heatmap_last_hour: u32,
    pub port: u16,
    pub google_api_key: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            db_path: "data/bay_last_mile.db".to_string(),
            timezone: "US/Pacific".to_string(),
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 7, 31),
            forecast_end: ymd(2015, 12, 31),
            blackout_dates: vec![ymd(2015, 7, 4)],
            feature_lists: FeatureListPaths::default(),
            heatmap_first_hour: 7,
            heatmap_last_hour: 18,
            port: 8080,
            google_api_key: None,
        }
    }
}

impl DashboardConfig {
    /// Read `path` if given, else defaults; the API key falls back to the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        if config.google_api_key.is_none() {
            config.google_api_key = std::env::var(GOOGLE_API_KEY_VAR).ok();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.train_start > self.train_end {
            return Err(DashboardError::InvalidRange {
                start: self.train_start,
                end: self.train_end,
            });
        }
        if self.train_end > self.forecast_end {
            return Err(DashboardError::InvalidRange {
                start: self.train_end,
                end: self.forecast_end,
            });
        }
        if self.heatmap_first_hour > self.heatmap_last_hour || self.heatmap_last_hour > 23 {
            return Err(DashboardError::InvalidInput(format!(
                "heatmap hours {}..={} outside 0..=23",
                self.heatmap_first_hour, self.heatmap_last_hour
            )));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| DashboardError::InvalidInput(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn window(&self) -> ForecastWindow {
        ForecastWindow {
            train_start: self.train_start,
            train_end: self.train_end,
            forecast_end: self.forecast_end,
        }
    }

    pub fn heatmap_hours(&self) -> RangeInclusive<u32> {
        self.heatmap_first_hour..=self.heatmap_last_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.tz().unwrap(), chrono_tz::US::Pacific);
        assert_eq!(config.window().train_end, ymd(2015, 7, 31));
        assert_eq!(config.heatmap_hours(), 7..=18);
        assert_eq!(
            config.feature_lists.for_stop(StopType::Pickups),
            Path::new("data/features_pickups.csv")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"db_path": "/tmp/store", "blackout_dates": [], "feature_lists": {{"pickups": "p.csv"}}}}"#
        )
        .unwrap();

        let config = DashboardConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.db_path, "/tmp/store");
        assert!(config.blackout_dates.is_empty());
        assert_eq!(config.feature_lists.pickups, PathBuf::from("p.csv"));
        assert_eq!(config.feature_lists.combined, PathBuf::from("data/features_combined.csv"));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_rejects_bad_timezone_and_range() {
        let config = DashboardConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DashboardError::InvalidInput(_))));

        let config = DashboardConfig {
            train_start: ymd(2015, 8, 1),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DashboardError::InvalidRange { .. })));
    }
}
