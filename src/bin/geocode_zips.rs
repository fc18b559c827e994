//! Look up coordinates for every stored zip code, and optionally the driving
//! distance from a depot, writing the results as CSV.
//!
//! Usage:
//!   GOOGLE_API_KEY=... geocode_zips [--origin "2000 Folsom St, San Francisco"] [--output data/zip_locations.csv]

use anyhow::Result;
use bay_last_mile::{
    config::DashboardConfig,
    db,
    geocode::GeocodeClient,
    models::StopType,
};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "geocode_zips")]
#[command(about = "Geocode stored zip codes via the Google Maps APIs")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Depot address to measure distances from
    #[arg(long)]
    origin: Option<String>,

    #[arg(long, default_value = "data/zip_locations.csv")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct ZipLocation {
    zipcode: String,
    lat: Option<f64>,
    lng: Option<f64>,
    distance: Option<String>,
    duration: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = DashboardConfig::load(args.config.as_deref())?;
    let Some(api_key) = config.google_api_key.clone() else {
        anyhow::bail!("no Google API key: set google_api_key in the config or GOOGLE_API_KEY");
    };

    let db = db::connect(&config.db_path).await?;
    let events = db::load_events(&db, StopType::PickupsAndDeliveries).await?;
    let zips: Vec<String> = events
        .iter()
        .map(|e| e.zipcode.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    info!("Geocoding {} zip codes", zips.len());

    let client = GeocodeClient::new(api_key);
    let located = client.geocode_all(&zips).await;
    let legs = match &args.origin {
        Some(origin) => Some(client.distances_from(origin, &zips).await),
        None => None,
    };

    let mut failures = 0;
    let mut wtr = csv::Writer::from_path(&args.output)?;
    for (i, (zip, location)) in located.into_iter().enumerate() {
        let location = location.ok();
        let leg = legs
            .as_ref()
            .and_then(|legs| legs.get(i))
            .and_then(|(_, leg)| leg.as_ref().ok());
        if location.is_none() {
            failures += 1;
        }
        wtr.serialize(ZipLocation {
            zipcode: zip,
            lat: location.map(|l| l.lat),
            lng: location.map(|l| l.lng),
            distance: leg.map(|l| l.distance.clone()),
            duration: leg.map(|l| l.duration.clone()),
        })?;
    }
    wtr.flush()?;

    if failures > 0 {
        warn!("{} zip codes could not be geocoded", failures);
    }
    info!("Wrote {:?}", args.output);
    Ok(())
}
