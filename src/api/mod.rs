//! REST API for the volume dashboard

pub mod handlers;
pub mod service;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use service::DashboardService;

pub fn create_rest_router(service: Arc<DashboardService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/heatmap", get(handlers::get_heatmap))
        .route("/api/v1/predict", get(handlers::get_prediction))
        .route("/api/v1/counts", get(handlers::get_counts))
        .route("/api/v1/zips/summary", get(handlers::get_zip_summary))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
