//! Command line viewer of the hosted measurement table.
//!
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::TimestampPrecision;
use measure_server::{
    compare::format_table,
    config::TableArgs,
    report::{to_csv, ColumnStats, Statistics},
    store::{MeasurementStore, PostgrestStore},
};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Inspect stored body measurements")]
struct Args {
    #[clap(flatten)]
    table: TableArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all measurements, newest first, with summary statistics
    List,
    /// Export all measurements as CSV
    Export {
        #[clap(long, default_value = "measurement_history.csv")]
        output: PathBuf,
    },
    /// Delete a measurement by id
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let (url, key) = args
        .table
        .credentials()
        .context("SUPABASE_URL and SUPABASE_KEY must be set")?;
    let store = PostgrestStore::new(url, key);

    match args.command {
        Command::List => list(&store).await,
        Command::Export { output } => export(&store, output).await,
        Command::Delete { id } => {
            if store.delete(id).await? {
                println!("Measurement {id} deleted");
            } else {
                println!("No measurement with id {id}");
            }
            Ok(())
        }
    }
}

async fn list(store: &PostgrestStore) -> Result<()> {
    let measurements = store.all().await?;
    if measurements.is_empty() {
        println!("No measurements stored yet.");
        return Ok(());
    }

    let headers = [
        "id",
        "timestamp",
        "height",
        "shoulder_width",
        "chest_circumference",
        "waist_circumference",
    ]
    .map(String::from);
    let rows: Vec<Vec<String>> = measurements
        .iter()
        .map(|m| {
            vec![
                m.id.to_string(),
                m.timestamp.clone(),
                m.height.to_string(),
                m.shoulder_width.to_string(),
                m.chest_circumference.to_string(),
                m.waist_circumference.to_string(),
            ]
        })
        .collect();
    println!("\nMeasurements:\n{}", format_table(&headers, &rows));

    let statistics = Statistics::of(&measurements);
    let columns = statistics.columns();
    let mut headers = vec![String::new()];
    headers.extend(columns.iter().map(|(name, _)| name.to_string()));

    let stat_rows: [(&str, fn(&ColumnStats) -> f64); 8] = [
        ("count", |s| s.count as f64),
        ("mean", |s| s.mean),
        ("std", |s| s.std.unwrap_or(f64::NAN)),
        ("min", |s| s.min),
        ("25%", |s| s.p25),
        ("50%", |s| s.p50),
        ("75%", |s| s.p75),
        ("max", |s| s.max),
    ];
    let rows: Vec<Vec<String>> = stat_rows
        .iter()
        .map(|(label, get)| {
            let mut row = vec![label.to_string()];
            row.extend(columns.iter().map(|(_, stats)| match stats {
                Some(stats) => format!("{:.2}", get(stats)),
                None => "-".into(),
            }));
            row
        })
        .collect();
    println!("\nStatistics:\n{}", format_table(&headers, &rows));

    Ok(())
}

async fn export(store: &PostgrestStore, output: PathBuf) -> Result<()> {
    let measurements = store.all().await?;
    if measurements.is_empty() {
        println!("No measurements to export");
        return Ok(());
    }

    tokio::fs::write(&output, to_csv(&measurements)?)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Exported {} measurements to {}", measurements.len(), output.display());
    Ok(())
}
