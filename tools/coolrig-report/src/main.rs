//! Runs a cooling-rig simulation and writes its temperature series and
//! event log to CSV.

mod output;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use coolrig::{Preset, Simulation, SimulationConfig};

#[derive(Parser, Debug)]
#[command(name = "coolrig-report")]
#[command(about = "Run a cooling-rig simulation and export CSV reports", long_about = None)]
struct Args {
    /// Built-in preset (laptop, endurance, raspberry-pi)
    #[arg(short, long, conflicts_with = "config", default_value = "laptop")]
    preset: String,

    /// JSON configuration file; unset fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the simulated duration (s)
    #[arg(short, long)]
    duration_s: Option<u64>,

    /// Temperature series CSV (default: series-<timestamp>.csv)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Event log CSV (default: events-<timestamp>.csv)
    #[arg(long)]
    events: Option<PathBuf>,

    /// Also write the summary as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip the terminal summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Error)]
enum ReportError {
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => Preset::from_str(&args.preset)
            .map_err(|_| ReportError::UnknownPreset(args.preset.clone()))?
            .config(),
    };
    if let Some(duration_s) = args.duration_s {
        config.total_duration_s = duration_s;
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let mut simulation = Simulation::new(config)?;
    tracing::info!(steps = simulation.config().total_steps(), "Running simulation");
    let summary = simulation.run_to_completion();

    let stamp = output::timestamp();
    let series_path = args
        .csv
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("series-{stamp}.csv")));
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("events-{stamp}.csv")));

    output::write_series(&series_path, simulation.series())?;
    output::write_events(&events_path, simulation.events())?;
    if let Some(path) = &args.json {
        output::write_summary_json(path, &summary)?;
    }

    if !args.quiet {
        output::print_summary(&summary);
        println!();
        println!("Series: {}", series_path.display());
        println!("Events: {}", events_path.display());
    }

    Ok(())
}
