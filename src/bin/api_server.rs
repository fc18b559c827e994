//! REST API server for the Bay Area volume dashboard
//!
//! Usage:
//!   ./target/release/api_server [--config dashboard.json] [--port PORT] [--db-path PATH]
//!
//! REST endpoints:
//!   GET /api/v1/health          - Health check
//!   GET /api/v1/heatmap         - Hour x day-of-week volume grid
//!   GET /api/v1/predict         - Volume forecast for a date
//!   GET /api/v1/counts          - Daily counts per zip code
//!   GET /api/v1/zips/summary    - Per-zip totals and revenue

use anyhow::Result;
use bay_last_mile::api::{create_rest_router, DashboardService};
use bay_last_mile::config::DashboardConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the volume dashboard API")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SurrealDB store (overrides the config)
    #[arg(long)]
    db_path: Option<String>,
}

fn print_banner(config: &DashboardConfig) {
    println!("============================================================");
    println!("         BAY AREA LAST-MILE VOLUME API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:     {}", config.port);
    println!("  Store:    {}", config.db_path);
    println!("  Zone:     {}", config.timezone);
    println!("  REST:     http://localhost:{}/api/v1/", config.port);
    println!();
    println!("REST Endpoints:");
    println!("  GET /api/v1/health              Health check");
    println!("  GET /api/v1/heatmap             Volume heatmap");
    println!("  GET /api/v1/predict             Forecast for a date");
    println!("  GET /api/v1/counts              Daily counts per zip");
    println!("  GET /api/v1/zips/summary        Zip summary");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    let mut config = DashboardConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.db_path {
        config.db_path = path;
    }

    print_banner(&config);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let service = Arc::new(DashboardService::connect(config).await?);
    let app = create_rest_router(service);

    tracing::info!("Starting REST server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
