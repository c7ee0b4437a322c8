//! CSV export and terminal summary.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use coolrig::sim::SimEvent;
use coolrig::{Summary, Termination};

#[derive(Debug, Serialize)]
struct SeriesRow {
    time_s: u64,
    time_h: f64,
    temperature_c: f64,
}

#[derive(Debug, Serialize)]
struct EventRow {
    time_s: u64,
    kind: &'static str,
    detail: String,
}

/// Local time formatted for file names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

pub fn write_series(path: &Path, series: &[(u64, f64)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &(time_s, temperature_c) in series {
        writer.serialize(SeriesRow {
            time_s,
            time_h: time_s as f64 / 3600.0,
            temperature_c,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_events(path: &Path, events: &[SimEvent]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for event in events {
        writer.serialize(EventRow {
            time_s: event.timestamp_s,
            kind: event.kind.name(),
            detail: event.kind.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &Summary) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

pub fn print_summary(summary: &Summary) {
    println!("{}", "═══ COOLING RUN ═══".cyan().bold());

    let termination = match summary.termination {
        Termination::Completed => summary.termination.to_string().green(),
        _ => summary.termination.to_string().red().bold(),
    };
    println!("{} {}", "Result:".white(), termination);
    println!(
        "{} {} steps, {:.2} h simulated",
        "Ran:".white(),
        summary.steps,
        summary.simulated_s as f64 / 3600.0
    );
    println!(
        "{} final {:.2}°C, peak {}",
        "Temperature:".white(),
        summary.final_temp_c,
        peak(summary.peak_temp_c)
    );
    println!(
        "{} {} purges, {} swaps, {} refills",
        "CO2:".white(),
        summary.purge_count,
        summary.canister_swap_count,
        summary.refill_count
    );
    println!(
        "{} canister {} active, [{:.0} J, {:.0} J] left, {:.0} J spent",
        "Canisters:".white(),
        summary.active_canister + 1,
        summary.canisters_j[0],
        summary.canisters_j[1],
        summary.co2_spent_j
    );
    println!(
        "{} {:.2} Wh ({:.1}%)",
        "Battery:".white(),
        summary.battery_wh,
        summary.battery_fraction * 100.0
    );

    println!("{}", "Heat removed:".white());
    let ledger = &summary.ledger;
    let shares = &summary.shares;
    for (label, joules, pct) in [
        ("passive", ledger.passive_j, shares.passive_pct),
        ("conduction", ledger.conduction_j, shares.conduction_pct),
        ("hiss", ledger.hiss_j, shares.hiss_pct),
        ("purge", ledger.purge_j, shares.purge_pct),
        ("peltier", ledger.peltier_j, shares.peltier_pct),
    ] {
        println!("  {label:<11} {joules:>14.0} J  {pct:>5.1}%");
    }
    println!("  {:<11} {:>14.0} J", "fan boost", ledger.fan_boost_j);
}

fn peak(temp_c: f64) -> ColoredString {
    let text = format!("{temp_c:.2}°C");
    if temp_c >= 90.0 {
        text.red().bold()
    } else if temp_c >= 75.0 {
        text.yellow()
    } else {
        text.green()
    }
}
