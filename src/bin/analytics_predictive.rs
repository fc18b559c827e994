//! Volume analytics - when and where will stops happen?
//! Daily counts, hour x weekday heatmap, OLS volume forecast, zip summary
//!
//! Run: ./target/release/analytics_predictive [section] [--zip 94110] [--stop Pickups] [--out-dir out/]
//! Sections: all, counts, heatmap, forecast, summary

use anyhow::Result;
use bay_last_mile::{
    api::service::{HeatmapRequest, PredictRequest},
    api::DashboardService,
    config::DashboardConfig,
    counts::ZipSelection,
    models::{parse_user_date, StopType},
};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "analytics_predictive")]
#[command(about = "Print volume analytics from the event store")]
struct Args {
    /// all, counts, heatmap, forecast, summary
    #[arg(default_value = "all")]
    section: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// "all" or a comma-separated zip list
    #[arg(long, default_value = "all")]
    zip: String,

    /// Pickups, Deliveries or "Pickups and Deliveries"
    #[arg(long, default_value = "Pickups and Deliveries")]
    stop: String,

    /// Day to highlight in the forecast
    #[arg(long, default_value = "2015-11-11")]
    date: String,

    /// Write counts and summary CSVs here
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(85));
    println!("  {}", title);
    println!("{}\n", "═".repeat(85));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(75));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = DashboardConfig::load(args.config.as_deref())?;
    let stop: StopType = args.stop.parse()?;
    let service = DashboardService::connect(config).await?;

    println!("\n{}", "█".repeat(85));
    println!("{}  VOLUME ANALYTICS - When Will Stops Happen?  {}", "█".repeat(17), "█".repeat(18));
    println!("{}\n", "█".repeat(85));

    match args.section.as_str() {
        "all" => {
            run_counts_section(&service, stop, &args).await?;
            run_heatmap_section(&service, stop, &args).await?;
            run_forecast_section(&service, stop, &args).await?;
            run_summary_section(&service, &args).await?;
        }
        "counts" => run_counts_section(&service, stop, &args).await?,
        "heatmap" => run_heatmap_section(&service, stop, &args).await?,
        "forecast" => run_forecast_section(&service, stop, &args).await?,
        "summary" => run_summary_section(&service, &args).await?,
        other => {
            println!("Unknown section: {}", other);
            println!("Available: all, counts, heatmap, forecast, summary");
        }
    }

    println!("\n{}", "█".repeat(85));
    Ok(())
}

async fn run_counts_section(service: &DashboardService, stop: StopType, args: &Args) -> Result<()> {
    print_section_header(&format!("1. DAILY COUNTS - {}", stop));

    let table = service.counts(stop).await?;
    println!("  Days:      {}", table.len());
    println!("  Zip codes: {}", table.columns().len());
    println!("  Total:     {}", table.total());

    print_subsection("Busiest Zip Codes");
    let mut totals: Vec<(String, u64)> = table.column_totals().into_iter().collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    println!("  {:10} {:>10} {:>12}", "Zip", "Total", "Per Day");
    println!("  {}", "─".repeat(34));
    for (zip, total) in totals.iter().take(10) {
        println!("  {:10} {:>10} {:>12.2}", zip, total, *total as f64 / table.len().max(1) as f64);
    }

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("counts_{}.csv", stop.label().to_lowercase().replace(' ', "_")));
        table.write_csv(File::create(&path)?)?;
        info!("Wrote {:?}", path);
        println!("\n  Exported to {:?}", path);
    }
    Ok(())
}

async fn run_heatmap_section(service: &DashboardService, stop: StopType, args: &Args) -> Result<()> {
    print_section_header(&format!("2. HOUR x WEEKDAY HEATMAP - {}", stop));

    let config = service.config();
    let req = HeatmapRequest {
        start: config.train_start,
        end: config.train_end,
        zips: ZipSelection::parse(&args.zip)?,
        stop,
    };
    let grid = service.heatmap(&req).await?;

    print!("  {:5}", "");
    for hour in &grid.hours {
        print!("{:>6}", format!("{}h", hour));
    }
    println!();
    for (day, row) in grid.days.iter().zip(&grid.cells) {
        print!("  {:5}", day);
        for count in row {
            print!("{:>6}", count);
        }
        println!();
    }
    println!("\n  Peak cell: {}", grid.max);
    Ok(())
}

async fn run_forecast_section(service: &DashboardService, stop: StopType, args: &Args) -> Result<()> {
    print_section_header(&format!("3. VOLUME FORECAST - {} - zip {}", stop, args.zip));

    let req = PredictRequest {
        date: parse_user_date(&args.date)?,
        zips: ZipSelection::parse(&args.zip)?,
        stop,
    };
    let report = service.predict(&req).await?;

    println!("  Training days:  {}", report.train.len());
    println!("  Forecast days:  {}", report.forecast.len());
    println!("  R²:             {:.3}", report.r_squared);
    println!("  Intercept:      {:.3}", report.intercept);
    println!("\n  ▶ Predicted volume on {}: {:.1}", report.date, report.predicted);

    print_subsection("Largest Coefficients");
    let mut coefs = report.coefficients.clone();
    coefs.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    for (name, value) in coefs.iter().take(10) {
        println!("  {:22} {:>10.3}", name, value);
    }

    print_subsection("Next 14 Forecast Days");
    for p in report.forecast.iter().take(14) {
        println!("  {}  {:>8.1}", p.date.format("%a %Y-%m-%d"), p.value);
    }
    Ok(())
}

async fn run_summary_section(service: &DashboardService, args: &Args) -> Result<()> {
    print_section_header("4. ZIP CODE SUMMARY");

    let mut rows = service.zip_summary().await?;
    rows.sort_by(|a, b| b.visits_total.cmp(&a.visits_total));

    println!(
        "  {:8} {:>8} {:>8} {:>8} {:>10} {:>12} {:>10}",
        "Zip", "Pickups", "Deliv", "Visits", "Last 28d", "Revenue $", "$/Visit"
    );
    println!("  {}", "─".repeat(72));
    for row in rows.iter().take(15) {
        let per_visit = row
            .visits_moneypervisit_total
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:8} {:>8} {:>8} {:>8} {:>10} {:>12.2} {:>10}",
            row.zipcode,
            row.pickups_total,
            row.deliveries_total,
            row.visits_total,
            row.visits_lastmonth,
            row.visits_money_total,
            per_visit
        );
    }

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("zip_summary.csv");
        let mut wtr = csv::Writer::from_path(&path)?;
        for row in &rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        println!("\n  Exported to {:?}", path);
    }
    Ok(())
}
