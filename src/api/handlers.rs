//! REST API handlers for the volume dashboard
//!
//! These handlers use the shared DashboardService.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use super::service::{DashboardService, HeatmapRequest, PredictRequest};
use crate::counts::{CountTable, ZipSelection};
use crate::error::DashboardError;
use crate::forecast::Prediction;
use crate::heatmap::HeatmapGrid;
use crate::models::{parse_user_date, StopType};
use crate::summary::ZipSummary;

pub const DEFAULT_HEATMAP_START: &str = "1/5/2015";
pub const DEFAULT_HEATMAP_END: &str = "7/1/2015";
pub const DEFAULT_PREDICT_DATE: &str = "2015-11-11";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HeatmapResponse {
    pub startdate: NaiveDate,
    pub enddate: NaiveDate,
    pub zipcode: String,
    pub pickup_deliv: String,
    #[serde(flatten)]
    pub grid: HeatmapGrid,
}

#[derive(Serialize)]
pub struct CoefficientResponse {
    pub feature: String,
    pub coefficient: f64,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub date_to_predict: NaiveDate,
    pub zipcode_to_predict: String,
    pub pickup_deliv_predict: String,
    pub predicted: f64,
    pub train: Vec<Prediction>,
    pub forecast: Vec<Prediction>,
    pub intercept: f64,
    pub r_squared: f64,
    pub coefficients: Vec<CoefficientResponse>,
}

#[derive(Serialize)]
pub struct CountsResponse {
    pub pickup_deliv: String,
    pub dates: Vec<String>,
    pub zipcodes: BTreeMap<String, Vec<u64>>,
    pub total: u64,
}

impl CountsResponse {
    fn new(stop: StopType, table: &CountTable) -> Self {
        Self {
            pickup_deliv: stop.label().to_string(),
            dates: table.keys().to_vec(),
            zipcodes: table.columns().clone(),
            total: table.total(),
        }
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct HeatmapQuery {
    pub startdate: Option<String>,
    pub enddate: Option<String>,
    pub zipcode: Option<String>,
    pub pickup_deliv: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    pub date_to_predict: Option<String>,
    pub zipcode_to_predict: Option<String>,
    pub pickup_deliv_predict: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopQuery {
    pub pickup_deliv: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::InvalidRange { .. }
        | DashboardError::InvalidInput(_)
        | DashboardError::EmptyRange(_)
        | DashboardError::InsufficientData { .. }
        | DashboardError::UnknownFeature(_) => StatusCode::BAD_REQUEST,
        DashboardError::UnknownZip(_)
        | DashboardError::UnknownGroupField(_)
        | DashboardError::UnknownDate(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: DashboardError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }
    (status, Json(ErrorResponse { error: err.to_string() }))
}

fn parse_stop(raw: Option<&str>) -> Result<StopType, DashboardError> {
    raw.map(str::parse).transpose().map(Option::unwrap_or_default)
}

fn parse_date(raw: Option<&str>, default: &str) -> Result<NaiveDate, DashboardError> {
    parse_user_date(raw.unwrap_or(default))
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<DashboardService>;

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/v1/heatmap
pub async fn get_heatmap(
    State(service): State<AppState>,
    Query(params): Query<HeatmapQuery>,
) -> Result<Json<HeatmapResponse>, ApiError> {
    let start = parse_date(params.startdate.as_deref(), DEFAULT_HEATMAP_START).map_err(api_error)?;
    let end = parse_date(params.enddate.as_deref(), DEFAULT_HEATMAP_END).map_err(api_error)?;
    let zipcode = params.zipcode.unwrap_or_else(|| "all".to_string());
    let zips = ZipSelection::parse(&zipcode).map_err(api_error)?;
    let stop = parse_stop(params.pickup_deliv.as_deref()).map_err(api_error)?;

    let req = HeatmapRequest { start, end, zips, stop };
    match service.heatmap(&req).await {
        Ok(grid) => Ok(Json(HeatmapResponse {
            startdate: start,
            enddate: end,
            zipcode,
            pickup_deliv: stop.label().to_string(),
            grid,
        })),
        Err(e) => Err(api_error(e)),
    }
}

/// GET /api/v1/predict
pub async fn get_prediction(
    State(service): State<AppState>,
    Query(params): Query<PredictQuery>,
) -> Result<Json<PredictResponse>, ApiError> {
    let date = parse_date(params.date_to_predict.as_deref(), DEFAULT_PREDICT_DATE).map_err(api_error)?;
    let zipcode = params.zipcode_to_predict.unwrap_or_else(|| "all".to_string());
    let zips = ZipSelection::parse(&zipcode).map_err(api_error)?;
    let stop = parse_stop(params.pickup_deliv_predict.as_deref()).map_err(api_error)?;

    let req = PredictRequest { date, zips, stop };
    match service.predict(&req).await {
        Ok(report) => Ok(Json(PredictResponse {
            date_to_predict: report.date,
            zipcode_to_predict: zipcode,
            pickup_deliv_predict: stop.label().to_string(),
            predicted: report.predicted,
            train: report.train,
            forecast: report.forecast,
            intercept: report.intercept,
            r_squared: report.r_squared,
            coefficients: report
                .coefficients
                .into_iter()
                .map(|(feature, coefficient)| CoefficientResponse { feature, coefficient })
                .collect(),
        })),
        Err(e) => Err(api_error(e)),
    }
}

/// GET /api/v1/counts
pub async fn get_counts(
    State(service): State<AppState>,
    Query(params): Query<StopQuery>,
) -> Result<Json<CountsResponse>, ApiError> {
    let stop = parse_stop(params.pickup_deliv.as_deref()).map_err(api_error)?;
    match service.counts(stop).await {
        Ok(table) => Ok(Json(CountsResponse::new(stop, &table))),
        Err(e) => Err(api_error(e)),
    }
}

/// GET /api/v1/zips/summary
pub async fn get_zip_summary(
    State(service): State<AppState>,
) -> Result<Json<Vec<ZipSummary>>, ApiError> {
    service.zip_summary().await.map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let d = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        assert_eq!(
            status_for(&DashboardError::InvalidRange { start: d, end: d }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DashboardError::InsufficientData { rows: 1, features: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&DashboardError::UnknownZip("1".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&DashboardError::UnknownDate(d)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&DashboardError::Geocode("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_query_defaults() {
        assert_eq!(parse_stop(None).unwrap(), StopType::PickupsAndDeliveries);
        assert_eq!(parse_stop(Some("Pickups")).unwrap(), StopType::Pickups);
        assert!(parse_stop(Some("Returns")).is_err());
        assert_eq!(
            parse_date(None, DEFAULT_HEATMAP_START).unwrap(),
            NaiveDate::from_ymd_opt(2015, 1, 5).unwrap()
        );
    }
}
