//! Error types for the dashboard library

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the aggregation, feature and forecast pipeline and by the
/// store and API layers around it.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Date bounds are reversed or fall outside the calendar being indexed
    #[error("invalid date range: {start} > {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A calendar or event set with zero rows where at least one is required
    #[error("empty range: {0}")]
    EmptyRange(String),

    /// The single-zip filter passed to the counter never occurs in the events
    #[error("zip code {0} does not occur in the events")]
    UnknownGroupField(String),

    /// A requested zip code is not a column of the count table
    #[error("zip code {0} not found in count table")]
    UnknownZip(String),

    /// A requested feature name is not a column of the feature matrix
    #[error("feature {0} not found in feature matrix")]
    UnknownFeature(String),

    /// A date that must be addressable (target day, prediction day) is missing
    #[error("no data for date {0}")]
    UnknownDate(NaiveDate),

    /// Fewer training rows than feature columns
    #[error("insufficient data: {rows} training rows for {features} features")]
    InsufficientData { rows: usize, features: usize },

    /// Malformed user or file input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Geocoding or distance lookup returned no usable result
    #[error("geocode error: {0}")]
    Geocode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
