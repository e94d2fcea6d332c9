//! Compare system measurements with manual reference measurements.
//!
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use measure_server::compare::Comparison;

const TITLE: &str = "==== MANUAL VS SYSTEM MEASUREMENTS ====";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Accuracy of system measurements against manual ones")]
struct Args {
    /// Manual height, shoulder width, chest and waist circumference in cm
    #[clap(long, num_args = 4, value_names = ["HEIGHT", "SHOULDER", "CHEST", "WAIST"], default_values_t = [180.0, 47.0, 120.0, 114.0])]
    manual: Vec<f32>,

    /// System height, shoulder width, chest and waist circumference in cm
    #[clap(long, num_args = 4, value_names = ["HEIGHT", "SHOULDER", "CHEST", "WAIST"], default_values_t = [178.0, 59.0, 137.0, 136.0])]
    system: Vec<f32>,

    /// File the comparison table is written to
    #[clap(long, default_value = "measurement_comparison_results.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let names = ["Height", "Shoulder Width", "Chest Circumference", "Waist Circumference"];
    let values: Vec<_> = names
        .iter()
        .zip(args.manual.iter().zip(args.system.iter()))
        .map(|(name, (manual, system))| (*name, *manual, *system))
        .collect();
    let table = Comparison::new(&values).to_table();

    println!("\n{TITLE}\n\n{table}");

    std::fs::write(&args.output, format!("{TITLE}\n\n{table}\n"))
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("\nComparison saved to {}", args.output.display());

    Ok(())
}
