pub mod api;
pub mod calendar;
pub mod config;
pub mod counts;
pub mod db;
pub mod error;
pub mod features;
pub mod forecast;
pub mod geocode;
pub mod heatmap;
pub mod holidays;
pub mod models;
pub mod summary;

pub use error::{DashboardError, Result};
