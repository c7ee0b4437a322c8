//! Command-line interface for coolrig.
//!
//! Runs a preset or a JSON configuration to completion and prints the
//! summary as JSON.

use std::env;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use strum::IntoEnumIterator;

use coolrig::tracing::prelude::*;
use coolrig::{Preset, Simulation, SimulationConfig, Summary};

fn main() -> Result<()> {
    coolrig::tracing::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: coolrig <command> [argument]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  run <preset|config.json>   Run a simulation and print its summary");
        eprintln!("  presets                    List built-in presets");
        eprintln!("  config <preset>            Print a preset's configuration as JSON");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  RUST_LOG    Log filter (default: info)");
        std::process::exit(1);
    }

    let command = &args[1];
    let argument = args.get(2).map(String::as_str);

    match (command.as_str(), argument) {
        ("run", Some(source)) => cmd_run(source)?,
        ("presets", _) => cmd_presets(),
        ("config", Some(name)) => cmd_config(name)?,
        _ => {
            eprintln!("Unknown or incomplete command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Resolve a preset name, or failing that, a path to a JSON config, and
/// set up a run from it.
fn build_simulation(source: &str) -> coolrig::Result<Simulation> {
    let config = match Preset::from_str(source) {
        Ok(preset) => preset.config(),
        Err(_) => SimulationConfig::load(Path::new(source))?,
    };
    Ok(Simulation::new(config)?)
}

fn cmd_run(source: &str) -> Result<()> {
    let mut simulation = build_simulation(source)
        .with_context(|| format!("{source} is neither a preset nor a usable config"))?;

    info!(source, steps = simulation.config().total_steps(), "Starting run");
    let summary = simulation.run_to_completion();
    info!(termination = %summary.termination, steps = summary.steps, "Run finished");

    write_summary(std::io::stdout().lock(), &summary)?;
    Ok(())
}

fn write_summary(mut out: impl Write, summary: &Summary) -> coolrig::Result<()> {
    serde_json::to_writer_pretty(&mut out, summary)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_presets() {
    for preset in Preset::iter() {
        println!("{:<14} {}", preset.to_string(), preset.description());
    }
}

fn cmd_config(name: &str) -> Result<()> {
    let preset = Preset::from_str(name).with_context(|| format!("unknown preset: {name}"))?;
    println!("{}", serde_json::to_string_pretty(&preset.config())?);
    Ok(())
}
