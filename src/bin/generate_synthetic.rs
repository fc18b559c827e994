//! Synthetic pickup/delivery generator for the Bay Area dashboard
//!
//! Produces two CSVs (`timestamp,zipcode,value_cents`, UTC timestamps) whose
//! volume follows a weekday profile, an intraday profile, a slow trend and
//! holiday dips, spread over population-weighted San Francisco zip codes.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --start <DATE>       First day (default: 2015-01-01)
//!   --end <DATE>         Last day (default: 2015-07-31)
//!   --daily-mean <N>     Mean pickups per weekday (default: 60)
//!   --seed <N>           Random seed for reproducibility (optional)
//!   --out-dir <PATH>     Output directory (default: raw-data)

use anyhow::Result;
use bay_last_mile::holidays::federal_holidays;
use bay_last_mile::models::{parse_user_date, TIMESTAMP_FORMAT};
use chrono::{Datelike, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use clap::Parser;
use csv::Writer;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate synthetic pickup and delivery events")]
struct Args {
    #[arg(long, default_value = "2015-01-01")]
    start: String,

    #[arg(long, default_value = "2015-07-31")]
    end: String,

    /// Mean pickups on an average weekday across all zips
    #[arg(long, default_value = "60")]
    daily_mean: f64,

    /// Deliveries per pickup
    #[arg(long, default_value = "0.9")]
    delivery_ratio: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Zone the business hours are expressed in
    #[arg(long, default_value = "US/Pacific")]
    tz: String,

    #[arg(long, default_value = "raw-data")]
    out_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct OutputRecord {
    timestamp: String,
    zipcode: String,
    value_cents: i64,
}

/// San Francisco zip codes with a rough share of customers
const ZIP_WEIGHTS: [(&str, f64); 12] = [
    ("94110", 14.0),
    ("94103", 10.0),
    ("94114", 9.0),
    ("94117", 8.0),
    ("94109", 8.0),
    ("94107", 7.0),
    ("94115", 7.0),
    ("94122", 6.0),
    ("94118", 6.0),
    ("94131", 5.0),
    ("94123", 5.0),
    ("94133", 4.0),
];

/// Mon..Sun volume multipliers
const WEEKDAY_PROFILE: [f64; 7] = [0.9, 1.25, 1.2, 1.0, 1.05, 0.55, 0.35];

/// Hours 0..23
fn hour_weights(pickups: bool) -> [f64; 24] {
    let mut w = [0.0; 24];
    for (h, weight) in w.iter_mut().enumerate() {
        *weight = match h {
            7..=9 => if pickups { 3.0 } else { 1.0 },
            10..=15 => 2.0,
            16..=19 => if pickups { 1.0 } else { 3.0 },
            20..=21 => 0.5,
            _ => 0.02,
        };
    }
    w
}

/// Poisson-distributed stop count for one day; a non-positive mean gives no stops
fn daily_count(rng: &mut StdRng, mean: f64) -> Result<u64> {
    if mean <= 0.0 {
        return Ok(0);
    }
    let dist = Poisson::new(mean)?;
    Ok(dist.sample(rng) as u64)
}

fn generate(
    rng: &mut StdRng,
    args: &Args,
    tz: Tz,
    start: NaiveDate,
    end: NaiveDate,
    pickups: bool,
) -> Result<Vec<OutputRecord>> {
    let holidays = federal_holidays(start, end);
    let zips = WeightedIndex::new(ZIP_WEIGHTS.iter().map(|(_, w)| *w))?;
    let hours = WeightedIndex::new(hour_weights(pickups))?;
    let base = if pickups { args.daily_mean } else { args.daily_mean * args.delivery_ratio };
    let span = (end - start).num_days().max(1) as f64;

    let mut out = Vec::new();
    let mut date = start;
    while date <= end {
        let dow = date.weekday().num_days_from_monday() as usize;
        let trend = 1.0 + 0.3 * (date - start).num_days() as f64 / span;
        let holiday = if holidays.contains(&date) { 0.3 } else { 1.0 };
        let n = daily_count(rng, base * WEEKDAY_PROFILE[dow] * trend * holiday)?;

        for _ in 0..n {
            let zip = ZIP_WEIGHTS[zips.sample(rng)].0;
            let hour = hours.sample(rng) as u32;
            let minute = rng.gen_range(0..60);
            let Some(local) = date.and_hms_opt(hour, minute, 0) else {
                continue;
            };
            // skip times that do not exist on DST change days
            let Some(zoned) = tz.from_local_datetime(&local).earliest() else {
                continue;
            };
            let cents = if pickups {
                rng.gen_range(1_500..12_000)
            } else {
                rng.gen_range(2_500..25_000)
            };
            out.push(OutputRecord {
                timestamp: zoned.naive_utc().format(TIMESTAMP_FORMAT).to_string(),
                zipcode: zip.to_string(),
                value_cents: cents,
            });
        }
        date += Duration::days(1);
    }
    Ok(out)
}

fn write_csv(path: &PathBuf, records: &[OutputRecord]) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let start = parse_user_date(&args.start)?;
    let end = parse_user_date(&args.end)?;
    if start > end {
        anyhow::bail!("--start {} is after --end {}", start, end);
    }
    let tz: Tz = args
        .tz
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown timezone {}", args.tz))?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    std::fs::create_dir_all(&args.out_dir)?;

    let pickups = generate(&mut rng, &args, tz, start, end, true)?;
    let path = args.out_dir.join("pickups.csv");
    write_csv(&path, &pickups)?;
    info!("Wrote {} pickups to {:?}", pickups.len(), path);

    let deliveries = generate(&mut rng, &args, tz, start, end, false)?;
    let path = args.out_dir.join("deliveries.csv");
    write_csv(&path, &deliveries)?;
    info!("Wrote {} deliveries to {:?}", deliveries.len(), path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mean(mean: f64) -> f64 {
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 2000;
        let total: u64 = (0..draws).map(|_| daily_count(&mut rng, mean).unwrap()).sum();
        total as f64 / draws as f64
    }

    #[test]
    fn test_daily_count_tracks_mean() {
        assert!((sample_mean(97.5) - 97.5).abs() < 2.0);
        assert!((sample_mean(800.0) - 800.0).abs() < 10.0);
        assert!((sample_mean(2000.0) - 2000.0).abs() < 10.0);
    }

    #[test]
    fn test_daily_count_zero_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(daily_count(&mut rng, 0.0).unwrap(), 0);
    }
}
