//! Load pickup and delivery CSV exports into the event store.
//!
//! Usage:
//!   ingest --pickups raw-data/pickups.csv --deliveries raw-data/deliveries.csv [--replace]

use anyhow::Result;
use bay_last_mile::{
    config::DashboardConfig,
    db,
    models::{read_csv_events, EventKind},
};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load pickup and delivery events into SurrealDB")]
struct Args {
    /// Pickup (submission) CSV: timestamp,zipcode[,value_cents]
    #[arg(long)]
    pickups: Option<PathBuf>,

    /// Delivery (order) CSV: timestamp,zipcode[,value_cents]
    #[arg(long)]
    deliveries: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the store path from the config
    #[arg(long)]
    db_path: Option<String>,

    /// Override the timezone events are normalised into
    #[arg(long)]
    tz: Option<String>,

    /// Delete previously stored events first
    #[arg(long)]
    replace: bool,
}

async fn ingest_file(db: &db::DbConn, path: &Path, kind: EventKind, tz: chrono_tz::Tz) -> Result<usize> {
    info!("Reading {} events from {:?}", kind.as_str(), path);
    let load = read_csv_events(File::open(path)?, kind, tz)?;
    info!(
        "Parsed {} {} events ({} rows skipped)",
        load.events.len(),
        kind.as_str(),
        load.skipped
    );

    let written = db::insert_events(db, &load.events).await?;
    info!("Inserted {} {} events", written, kind.as_str());
    Ok(written)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = DashboardConfig::load(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.db_path = path;
    }
    if let Some(tz) = args.tz {
        config.timezone = tz;
    }
    let tz = config.tz()?;

    if args.pickups.is_none() && args.deliveries.is_none() {
        anyhow::bail!("nothing to ingest: pass --pickups and/or --deliveries");
    }

    info!("Connecting to SurrealDB at {}", config.db_path);
    let db = db::connect(&config.db_path).await?;

    info!("Initializing schema...");
    db::init_schema(&db).await?;

    if args.replace {
        db::clear_events(&db).await?;
    }

    let mut total = 0;
    if let Some(path) = &args.pickups {
        total += ingest_file(&db, path, EventKind::Pickup, tz).await?;
    }
    if let Some(path) = &args.deliveries {
        total += ingest_file(&db, path, EventKind::Delivery, tz).await?;
    }

    info!("Ingestion complete: {} events", total);
    info!("Database totals:");
    for (kind, n) in db::count_events(&db).await? {
        info!("  {}: {}", kind, n);
    }

    Ok(())
}
