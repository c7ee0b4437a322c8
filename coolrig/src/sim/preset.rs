use serde::{Deserialize, Serialize};

use crate::config::{CanisterSupply, SimulationConfig};

use super::workload::WorkloadSpec;

const DAY_S: u64 = 24 * 3600;
const YEAR_S: u64 = 365 * DAY_S;

/// Named starting points for [`SimulationConfig`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Preset {
    /// One hour of a busy laptop on a 60 Wh battery.
    Laptop,
    /// A year of 24/7 operation with canisters refilled as they run out.
    Endurance,
    /// Bench rig on a Raspberry Pi: fan and CO₂ valve, no Peltier.
    RaspberryPi,
}

impl Preset {
    pub fn description(&self) -> &'static str {
        match self {
            Preset::Laptop => "one-hour laptop run, 60 Wh battery, finite canisters",
            Preset::Endurance => "year-long 24/7 run, canisters refilled, daily status",
            Preset::RaspberryPi => "30-minute Pi bench test, no Peltier, halts when CO₂ runs out",
        }
    }

    pub fn config(&self) -> SimulationConfig {
        match self {
            Preset::Laptop => SimulationConfig::default(),
            Preset::Endurance => endurance(),
            Preset::RaspberryPi => raspberry_pi(),
        }
    }
}

fn endurance() -> SimulationConfig {
    let mut config = SimulationConfig {
        total_duration_s: YEAR_S,
        status_interval_s: DAY_S,
        workload: WorkloadSpec::Endurance,
        ..SimulationConfig::default()
    };
    config.thermal.emergency_temp_c = 75.0;
    config.co2.low_fuel_fraction = 0.15;
    config.peltier.max_cooling_w = 30.0;
    config.battery.capacity_wh = 8.5e9;
    config.policy.supply = CanisterSupply::Refill;
    config
}

fn raspberry_pi() -> SimulationConfig {
    let mut config = SimulationConfig {
        time_step_s: 2,
        total_duration_s: 1800,
        status_interval_s: 60,
        workload: WorkloadSpec::Constant { power_w: 7.5 },
        ..SimulationConfig::default()
    };
    config.thermal.cpu_power_w = 7.5;
    config.thermal.passive_dissipation_w = 1.0;
    config.thermal.emergency_temp_c = 75.0;
    config.thermal.critical_temp_c = 80.0;
    config.fan.passive_below_c = 45.0;
    config.fan.ramp_up_pct_per_s = 5.0;
    config.fan.ramp_down_pct_per_s = 2.5;
    config.subsystems.peltier = false;
    config.battery.capacity_wh = 20.0;
    config.policy.supply = CanisterSupply::Finite {
        halt_when_empty: true,
    };
    config
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn should_produce_valid_configs() {
        for preset in Preset::iter() {
            assert!(preset.config().validate().is_ok(), "{preset} is invalid");
        }
    }

    #[test]
    fn should_parse_kebab_case_names() {
        assert_eq!(Preset::from_str("raspberry-pi").unwrap(), Preset::RaspberryPi);
        assert_eq!(Preset::Endurance.to_string(), "endurance");
        assert!(Preset::from_str("desktop").is_err());
    }

    #[test]
    fn should_refill_during_endurance_run() {
        let config = Preset::Endurance.config();

        assert_eq!(config.policy.supply, CanisterSupply::Refill);
        assert_eq!(config.total_steps(), YEAR_S / 5);
    }

    #[test]
    fn should_run_pi_without_peltier() {
        let config = Preset::RaspberryPi.config();

        assert!(!config.subsystems.peltier);
        assert_eq!(config.total_steps(), 900);
    }
}
