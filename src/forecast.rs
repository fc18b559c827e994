//! Ordinary least squares over calendar features, fitted on a training window
//! and projected onto a forecast window.
//!
//! The forecast window starts on the last training day, so that day is
//! predicted in both outputs from the same coefficients.

use chrono::NaiveDate;
use serde::Serialize;
use std::ops::Range;
use tracing::debug;

use crate::calendar::Calendar;
use crate::counts::DailySeries;
use crate::error::{DashboardError, Result};
use crate::features::FeatureMatrix;

/// Training covers `[train_start, train_end]`, projection `[train_end, forecast_end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForecastWindow {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub forecast_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub value: f64,
}

/// Intercept plus one coefficient per named feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
    r_squared: f64,
}

/// Ridge weight on unit-scaled columns. Small enough to leave well-posed fits
/// unchanged, large enough to pin collinear dummy columns to a stable solution.
const RIDGE: f64 = 1e-10;

impl LinearModel {
    /// Fit `y ≈ x · coefficients + intercept`, one `x` row per observation
    pub fn fit(x: &[Vec<f64>], y: &[f64], feature_names: Vec<String>) -> Result<Self> {
        let n = y.len();
        let p = feature_names.len();
        if n == 0 {
            return Err(DashboardError::EmptyRange("no training rows".to_string()));
        }
        if x.len() != n || x.iter().any(|row| row.len() != p) {
            return Err(DashboardError::InvalidInput(format!(
                "design matrix shape does not match {} rows x {} features",
                n, p
            )));
        }

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n as f64)
            .collect();

        // Centred normal equations XcᵀXc β = Xcᵀyc
        let mut gram = vec![0.0; p * p];
        let mut rhs = vec![0.0; p];
        for (row, &target) in x.iter().zip(y) {
            let yc = target - y_mean;
            for a in 0..p {
                let xa = row[a] - x_mean[a];
                rhs[a] += xa * yc;
                for b in a..p {
                    gram[a * p + b] += xa * (row[b] - x_mean[b]);
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                gram[a * p + b] = gram[b * p + a];
            }
        }

        // Scale columns to unit norm so one ridge weight suits every feature
        let scale: Vec<f64> = (0..p)
            .map(|i| {
                let norm = gram[i * p + i].sqrt();
                if norm > 1e-12 { norm } else { 1.0 }
            })
            .collect();
        for a in 0..p {
            rhs[a] /= scale[a];
            for b in 0..p {
                gram[a * p + b] /= scale[a] * scale[b];
            }
            gram[a * p + a] += RIDGE;
        }

        let coefficients: Vec<f64> = solve_linear_system(gram, rhs, p)
            .into_iter()
            .zip(&scale)
            .map(|(c, s)| c / s)
            .collect();
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        let mut model = Self {
            feature_names,
            coefficients,
            intercept,
            r_squared: 0.0,
        };

        let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
        let ss_res: f64 = x
            .iter()
            .zip(y)
            .map(|(row, v)| (v - model.predict_row(row)).powi(2))
            .sum();
        model.r_squared = if ss_tot > 1e-10 { 1.0 - ss_res / ss_tot } else { 1.0 };

        Ok(model)
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.coefficients[i])
    }
}

/// Gaussian elimination with partial pivoting on a row-major `n x n` system.
/// Columns whose pivot vanishes get a zero coefficient.
fn solve_linear_system(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> Vec<f64> {
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i * n + col].abs().total_cmp(&a[j * n + col].abs()))
            .unwrap_or(col);
        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let pivot = a[col * n + col];
        if pivot.abs() < 1e-12 {
            continue;
        }
        for row in col + 1..n {
            let factor = a[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let pivot = a[row * n + row];
        if pivot.abs() < 1e-12 {
            continue;
        }
        let tail: f64 = (row + 1..n).map(|k| a[row * n + k] * x[k]).sum();
        x[row] = (b[row] - tail) / pivot;
    }
    x
}

/// In-sample and out-of-sample predictions plus the model that made them
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub train: Vec<Prediction>,
    pub forecast: Vec<Prediction>,
    pub model: LinearModel,
}

impl Forecast {
    /// Prediction for `date`, looking in the forecast range first
    pub fn prediction_on(&self, date: NaiveDate) -> Option<f64> {
        self.forecast
            .iter()
            .chain(&self.train)
            .find(|p| p.date == date)
            .map(|p| p.value)
    }
}

fn design_rows(features: &FeatureMatrix, rows: Range<usize>) -> Vec<Vec<f64>> {
    rows.map(|r| features.row(r)).collect()
}

fn predict_rows(model: &LinearModel, calendar: &Calendar, x: &[Vec<f64>], rows: Range<usize>) -> Vec<Prediction> {
    rows.zip(x)
        .map(|(r, row)| Prediction {
            date: calendar.rows()[r].date,
            value: model.predict_row(row),
        })
        .collect()
}

/// Fit on the training window of `series` using only `feature_names`, then
/// predict both the training and the forecast window.
///
/// `features` must be built from `calendar` (same rows, same order).
pub fn fit_and_forecast(
    series: &DailySeries,
    calendar: &Calendar,
    features: &FeatureMatrix,
    feature_names: &[String],
    window: &ForecastWindow,
) -> Result<Forecast> {
    if features.len() != calendar.len() {
        return Err(DashboardError::InvalidInput(format!(
            "feature matrix has {} rows, calendar has {}",
            features.len(),
            calendar.len()
        )));
    }

    let train_rows = calendar.range_between(window.train_start, window.train_end)?;
    let forecast_rows = calendar.range_between(window.train_end, window.forecast_end)?;

    let selected = features.select(feature_names)?;
    if train_rows.len() < selected.width() {
        return Err(DashboardError::InsufficientData {
            rows: train_rows.len(),
            features: selected.width(),
        });
    }

    let y = train_rows
        .clone()
        .map(|r| {
            let date = calendar.rows()[r].date;
            series.value_on(date).ok_or(DashboardError::UnknownDate(date))
        })
        .collect::<Result<Vec<f64>>>()?;

    let x_train = design_rows(&selected, train_rows.clone());
    let model = LinearModel::fit(&x_train, &y, feature_names.to_vec())?;
    debug!(
        rows = y.len(),
        features = selected.width(),
        r_squared = model.r_squared(),
        "fitted volume model"
    );

    let x_future = design_rows(&selected, forecast_rows.clone());
    Ok(Forecast {
        train: predict_rows(&model, calendar, &x_train, train_rows),
        forecast: predict_rows(&model, calendar, &x_future, forecast_rows),
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_calendar;
    use crate::features::build_features;
    use approx::assert_abs_diff_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recovers_exact_linear_relation() {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 + 2.0 * r[0] - 1.5 * r[1]).collect();

        let model = LinearModel::fit(&x, &y, names(&["a", "b"])).unwrap();
        assert_abs_diff_eq!(model.intercept(), 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(model.coefficient("a").unwrap(), 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(model.coefficient("b").unwrap(), -1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(model.r_squared(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_dummies_still_predict() {
        // all seven day-of-week dummies plus an intercept are collinear
        let cal = build_calendar(ymd(2015, 1, 5), ymd(2015, 3, 1)).unwrap();
        let features = build_features(&cal).unwrap();
        let dow: Vec<String> = (0..7).map(|d| format!("dayofweek_{}", d)).collect();
        let selected = features.select(&dow).unwrap();

        let pattern = [20.0, 35.0, 33.0, 25.0, 30.0, 12.0, 8.0];
        let y: Vec<f64> = cal.rows().iter().map(|r| pattern[r.day_of_week as usize]).collect();
        let x: Vec<Vec<f64>> = (0..cal.len()).map(|r| selected.row(r)).collect();

        let model = LinearModel::fit(&x, &y, dow).unwrap();
        for (row, expected) in x.iter().zip(&y) {
            assert_abs_diff_eq!(model.predict_row(row), *expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| 1.0 + i as f64).collect();
        let model = LinearModel::fit(&x, &y, names(&["t", "never"])).unwrap();
        assert_abs_diff_eq!(model.coefficient("never").unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.coefficient("t").unwrap(), 1.0, epsilon = 1e-6);
    }

    fn weekly_series(cal: &Calendar) -> DailySeries {
        let values = cal
            .rows()
            .iter()
            .map(|r| 40.0 + 0.1 * r.days_since_start as f64 - if r.day_of_week >= 5 { 15.0 } else { 0.0 })
            .collect();
        DailySeries::new(cal.rows().iter().map(|r| r.date).collect(), values).unwrap()
    }

    #[test]
    fn test_boundary_day_is_predicted_in_both_ranges() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 7, 31)).unwrap();
        let features = build_features(&cal).unwrap();
        let series = weekly_series(&cal);
        let window = ForecastWindow {
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 6, 30),
            forecast_end: ymd(2015, 7, 31),
        };

        let result = fit_and_forecast(
            &series,
            &cal,
            &features,
            &names(&["dayssincestart", "isweekend"]),
            &window,
        )
        .unwrap();

        assert_eq!(result.train.len(), 181);
        assert_eq!(result.forecast.len(), 32);

        let last_train = result.train.last().unwrap();
        let first_forecast = result.forecast.first().unwrap();
        assert_eq!(last_train.date, ymd(2015, 6, 30));
        assert_eq!(first_forecast.date, ymd(2015, 6, 30));
        assert_eq!(last_train.value, first_forecast.value);

        // Friday July 31st, well inside the forecast window
        let expected = 40.0 + 0.1 * 211.0;
        assert_abs_diff_eq!(result.prediction_on(ymd(2015, 7, 31)).unwrap(), expected, epsilon = 1e-6);
        assert_abs_diff_eq!(result.model.coefficient("isweekend").unwrap(), -15.0, epsilon = 1e-6);
    }

    #[test]
    fn test_forecast_beyond_observed_series() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 12, 31)).unwrap();
        let features = build_features(&cal).unwrap();
        let observed = build_calendar(ymd(2015, 1, 1), ymd(2015, 7, 31)).unwrap();
        let series = weekly_series(&observed);
        let window = ForecastWindow {
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 7, 31),
            forecast_end: ymd(2015, 12, 31),
        };

        let result = fit_and_forecast(&series, &cal, &features, &names(&["isweekend"]), &window).unwrap();
        assert_eq!(result.forecast.last().unwrap().date, ymd(2015, 12, 31));
        assert!(result.prediction_on(ymd(2015, 11, 11)).is_some());
        assert!(result.prediction_on(ymd(2016, 1, 1)).is_none());
    }

    #[test]
    fn test_underdetermined_fit_is_rejected() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 1, 31)).unwrap();
        let features = build_features(&cal).unwrap();
        let series = weekly_series(&cal);
        let window = ForecastWindow {
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 1, 2),
            forecast_end: ymd(2015, 1, 31),
        };
        let subset = names(&["dayssincestart", "isweekend", "week1", "istueswed", "isfrisat"]);

        let err = fit_and_forecast(&series, &cal, &features, &subset, &window).unwrap_err();
        assert!(matches!(err, DashboardError::InsufficientData { rows: 2, features: 5 }));
    }

    #[test]
    fn test_missing_target_day_and_unknown_feature() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 1, 31)).unwrap();
        let features = build_features(&cal).unwrap();
        let short = build_calendar(ymd(2015, 1, 10), ymd(2015, 1, 31)).unwrap();
        let series = weekly_series(&short);
        let window = ForecastWindow {
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 1, 20),
            forecast_end: ymd(2015, 1, 31),
        };

        let err = fit_and_forecast(&series, &cal, &features, &names(&["isweekend"]), &window).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownDate(d) if d == ymd(2015, 1, 1)));

        let err = fit_and_forecast(&series, &cal, &features, &names(&["lasso_1"]), &window).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownFeature(_)));
    }

    #[test]
    fn test_window_outside_calendar() {
        let cal = build_calendar(ymd(2015, 1, 1), ymd(2015, 1, 31)).unwrap();
        let features = build_features(&cal).unwrap();
        let series = weekly_series(&cal);
        let window = ForecastWindow {
            train_start: ymd(2015, 1, 1),
            train_end: ymd(2015, 1, 20),
            forecast_end: ymd(2015, 2, 15),
        };
        let err = fit_and_forecast(&series, &cal, &features, &names(&["isweekend"]), &window).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownDate(_)));
    }
}
