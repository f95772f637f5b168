use std::path::PathBuf;

use anyhow::{Context, Result};
use arena_demand::config::AppConfig;
use arena_demand::report::{format_count, format_currency};
use arena_demand::{CacheLock, ReportSnapshot, SystemClock, TargetMetric, run_full_analysis};
use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "arena-demand")]
#[command(about = "Forecast concession demand and staffing for an arena event")]
struct Args {
    /// Workbook file, or a directory of per-sheet CSV exports
    #[arg(long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Report snapshot location
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Recompute even if a fresh snapshot exists
    #[arg(long)]
    refresh: bool,

    /// Print the snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Event date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Event start time (HH:MM:SS)
    #[arg(long)]
    time: Option<NaiveTime>,

    /// Expected attendance
    #[arg(long)]
    attendance: Option<f64>,

    /// Event type, as named in the historical data
    #[arg(long)]
    event_type: Option<String>,

    /// Opponent, as named in the historical data
    #[arg(long)]
    opponent: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("arena_demand=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let event = config.event.descriptor();
    let cache_path = config.cache.path.clone();
    let max_age = config.cache.max_age_hours;
    let clock = SystemClock;

    // Held until exit so concurrent runs recompute and save one at a time
    let _lock = CacheLock::acquire(&cache_path)
        .with_context(|| format!("Failed to lock {}", cache_path.display()))?;

    if !args.refresh {
        match ReportSnapshot::load_optional(&cache_path) {
            Ok(Some(snapshot)) if snapshot.is_reusable_for(&event, max_age, &clock) => {
                tracing::info!("Using cached report ({})", snapshot.summary());
                return print_snapshot(&snapshot, args.json);
            }
            Ok(Some(snapshot)) => {
                tracing::info!(
                    "Cached report is stale or for another event ({})",
                    snapshot.summary()
                );
            }
            Ok(None) => tracing::debug!("No cached report at {}", cache_path.display()),
            Err(e) => tracing::warn!("Ignoring unreadable cached report: {}", e),
        }
    }

    let report = run_full_analysis(&config.data.path, &event, &config.analysis_settings())
        .with_context(|| format!("Analysis of {} failed", config.data.path.display()))?;

    let snapshot = ReportSnapshot::new(report, &clock);
    snapshot
        .save(&cache_path)
        .with_context(|| format!("Failed to write report snapshot to {}", cache_path.display()))?;

    print_snapshot(&snapshot, args.json)
}

/// Command-line values win over every configuration layer.
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(path) = &args.data {
        config.data.path = path.clone();
    }
    if let Some(path) = &args.cache {
        config.cache.path = path.clone();
    }
    if let Some(date) = args.date {
        config.event.date = date;
    }
    if let Some(time) = args.time {
        config.event.time = time;
        // A configured label would describe the old time
        config.event.time_label = None;
    }
    if let Some(attendance) = args.attendance {
        config.event.attendance = attendance;
    }
    if let Some(event_type) = &args.event_type {
        config.event.event_type = event_type.clone();
    }
    if let Some(opponent) = &args.opponent {
        config.event.opponent = opponent.clone();
    }
}

fn print_snapshot(snapshot: &ReportSnapshot, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(snapshot).context("Failed to serialize report")?;
        println!("{out}");
        return Ok(());
    }

    let report = &snapshot.report;
    let event = &report.event;

    println!(
        "{} vs {} on {} at {}",
        event.event_type,
        event.opponent,
        event
            .date
            .map(|d| d.format("%A, %B %-d, %Y").to_string())
            .unwrap_or_else(|| event.day_of_week.clone()),
        event.display_time()
    );
    println!("Expected attendance: {}", format_count(event.attendance));
    println!("Generated: {}", snapshot.generated_at.format("%Y-%m-%d %H:%M UTC"));

    println!("\nPredictions");
    for (target, value) in report.predictions.iter() {
        let shown = match target {
            TargetMetric::NetSales => format_currency(value),
            _ => format_count(value),
        };
        println!("  {:<14} {:>14}", target.column(), shown);
    }

    let derived = &report.derived_metrics;
    let ratio = |v: Option<f64>, digits: usize| {
        v.map(|v| format!("{v:.digits$}")).unwrap_or_else(|| "n/a".to_string())
    };
    println!("  Trans/attendee {:>14}", ratio(derived.trans_per_attendee, 3));
    println!("  Sales/attendee {:>14}", ratio(derived.sales_per_attendee, 2));
    println!("  Sales/trans    {:>14}", ratio(derived.sales_per_transaction, 2));

    println!("\nModels");
    for summary in &report.model_summaries {
        println!(
            "  {:<14} {:<18} R² {:.3}",
            summary.target.column(),
            summary.chosen.name(),
            summary.r2
        );
    }

    println!("\nStaffing");
    for allocation in &report.staffing.allocations {
        println!(
            "  {:<20} {:>5.1}% {:>10} tx {:>4} POS",
            allocation.stand_group,
            allocation.historical_share * 100.0,
            format_count(allocation.predicted_transactions),
            allocation.terminals_needed
        );
    }
    println!(
        "  Total: {} POS terminals, {} cashiers",
        report.staffing.total_terminals, report.staffing.total_cashiers
    );

    let attendance = &report.risk.attendance_risk;
    println!(
        "\nRisk: {} (historical {} average {})",
        attendance.risk_level,
        report.risk.event_type,
        attendance
            .historical_avg_attendance
            .map(format_count)
            .unwrap_or_else(|| "n/a".to_string())
    );

    println!("\nInsights");
    for insight in &report.insights {
        println!("  - {insight}");
    }

    Ok(())
}
