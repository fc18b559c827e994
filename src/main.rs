use anyhow::Result;
use bay_last_mile::{config::DashboardConfig, db};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ZipCount {
    zipcode: String,
    n: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args().nth(1);
    let config = DashboardConfig::load(config_path.as_deref().map(std::path::Path::new))?;

    let db = db::connect(&config.db_path).await?;
    info!("Connected to SurrealDB at {}", config.db_path);

    info!("=== Event Store Statistics ===");
    let counts = db::count_events(&db).await?;
    if counts.is_empty() {
        info!("No events stored yet; run `ingest` first");
    }
    for (kind, n) in &counts {
        info!("{:>10}: {}", kind, n);
    }

    let zips: Vec<ZipCount> = db
        .query("SELECT zipcode, count() AS n FROM event GROUP BY zipcode ORDER BY n DESC LIMIT 5")
        .await?
        .take(0)?;
    info!("Top 5 zip codes:");
    for z in &zips {
        info!("  {}: {}", z.zipcode, z.n);
    }

    let mut span = db
        .query("SELECT VALUE local_ts FROM event ORDER BY local_ts ASC LIMIT 1")
        .query("SELECT VALUE local_ts FROM event ORDER BY local_ts DESC LIMIT 1")
        .await?;
    let first: Option<String> = span.take(0)?;
    let last: Option<String> = span.take(1)?;
    info!("Event span: {:?} .. {:?}", first, last);

    Ok(())
}
