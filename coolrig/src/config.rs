//! Simulation configuration.
//!
//! A [`SimulationConfig`] is loaded once and never mutated by a running
//! simulation. Every group carries `#[serde(default)]`, so a JSON document
//! only needs to list the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::WorkloadSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub thermal: ThermalConfig,
    pub fan: FanConfig,
    pub peltier: PeltierConfig,
    pub co2: Co2Config,
    pub battery: BatteryConfig,
    pub subsystems: Subsystems,
    pub policy: Policy,
    pub workload: WorkloadSpec,

    /// Chamber pressure modelling; disabled when absent.
    pub pressure: Option<PressureConfig>,

    pub hardware: HardwareConfig,

    /// Integration step (s).
    pub time_step_s: u64,

    /// Length of a full run (s). The step count is
    /// `total_duration_s / time_step_s`, rounded down.
    pub total_duration_s: u64,

    /// Period of `Status` events (s). Zero disables them.
    pub status_interval_s: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            thermal: ThermalConfig::default(),
            fan: FanConfig::default(),
            peltier: PeltierConfig::default(),
            co2: Co2Config::default(),
            battery: BatteryConfig::default(),
            subsystems: Subsystems::default(),
            policy: Policy::default(),
            workload: WorkloadSpec::default(),
            pressure: None,
            hardware: HardwareConfig::default(),
            time_step_s: 5,
            total_duration_s: 3600,
            status_interval_s: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// Rated device power (W). Workload presets scale from this.
    pub cpu_power_w: f64,

    /// Passive chassis dissipation (W). Under
    /// [`PassiveModel::AmbientDelta`] this is the rate at
    /// `reference_delta_c` above ambient.
    pub passive_dissipation_w: f64,

    pub passive_model: PassiveModel,

    pub thermal_mass_j_per_c: f64,

    pub initial_temp_c: f64,

    pub ambient_temp_c: f64,

    /// Above this the rig purges unconditionally.
    pub critical_temp_c: f64,

    /// Above this the rig purges pre-emptively when the active canister
    /// runs low.
    pub emergency_temp_c: f64,

    /// Lower bound on device temperature as a fraction of ambient.
    pub floor_fraction_of_ambient: Option<f64>,

    /// Gap below each band threshold before a falling temperature is
    /// reported as leaving the band.
    pub band_hysteresis_c: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            cpu_power_w: 18.5,
            passive_dissipation_w: 1.5,
            passive_model: PassiveModel::Constant,
            thermal_mass_j_per_c: 300.0,
            initial_temp_c: 25.0,
            ambient_temp_c: 25.0,
            critical_temp_c: 90.0,
            emergency_temp_c: 78.0,
            floor_fraction_of_ambient: Some(0.8),
            band_hysteresis_c: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassiveModel {
    /// Fixed dissipation regardless of temperature.
    Constant,
    /// Dissipation proportional to the rise above ambient.
    AmbientDelta { reference_delta_c: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    /// Electrical draw at 100 % duty (W).
    pub power_draw_w: f64,

    /// Convective boost at full duty, before the speed factor.
    pub efficiency_multiplier_base: f64,

    /// Absolute cap on the combined multiplier.
    pub efficiency_multiplier_max: Option<f64>,

    /// Extra gain from airflow speed at full duty.
    pub speed_gain: f64,

    /// Peak synergy with a freshly purged canister, decaying over the
    /// conduction window.
    pub purge_boost_gain: f64,

    pub passive_below_c: f64,
    pub warning_below_c: f64,
    pub high_above_c: f64,

    /// Idle pulse while in `SLOW_HISS`.
    pub pulse_duty: f64,
    pub pulse_period_s: u64,

    pub purge_assist_duty: f64,
    pub normal_duty: f64,

    /// Scale `NORMAL` duty linearly from `normal_duty` at the warning
    /// threshold to 100 % at the high threshold.
    pub scale_normal_duty: bool,

    /// Spin-up is faster than spin-down.
    pub ramp_up_pct_per_s: f64,
    pub ramp_down_pct_per_s: f64,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            power_draw_w: 0.25,
            efficiency_multiplier_base: 1.3,
            efficiency_multiplier_max: Some(2.5),
            speed_gain: 0.7,
            purge_boost_gain: 0.5,
            passive_below_c: 50.0,
            warning_below_c: 65.0,
            high_above_c: 75.0,
            pulse_duty: 30.0,
            pulse_period_s: 15,
            purge_assist_duty: 80.0,
            normal_duty: 50.0,
            scale_normal_duty: false,
            ramp_up_pct_per_s: 2.0,
            ramp_down_pct_per_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeltierConfig {
    pub max_cooling_w: f64,
    pub power_draw_w: f64,

    /// Longest continuous run before a forced rest (s).
    pub max_runtime_s: f64,

    /// Efficiency with no adverse differential across the module.
    pub efficiency_base: f64,

    /// Differential (°C) at which the quadratic falloff reaches zero.
    pub differential_span_c: f64,

    /// Hot-side temperature beyond which efficiency is halved.
    pub derate_above_c: f64,

    pub activate_above_c: f64,
    pub deactivate_below_c: f64,

    /// Fractions of battery capacity.
    pub min_battery_fraction: f64,
    pub critical_battery_fraction: f64,

    /// No activation at or above this hot-side temperature.
    pub hot_side_limit_c: f64,
    /// Forced shutdown above this hot-side temperature.
    pub hot_side_cutoff_c: f64,

    /// Seconds after a purge during which the module may run below its
    /// activation threshold.
    pub post_purge_window_s: u64,

    pub hot_side_thermal_mass_j_per_c: f64,
    pub hot_side_dissipation_w_per_c: f64,

    /// Fraction of the hot-to-device gap closed per second while idle.
    pub hot_side_relax_per_s: f64,
}

impl Default for PeltierConfig {
    fn default() -> Self {
        Self {
            max_cooling_w: 15.0,
            power_draw_w: 30.0,
            max_runtime_s: 120.0,
            efficiency_base: 0.6,
            differential_span_c: 70.0,
            derate_above_c: 85.0,
            activate_above_c: 70.0,
            deactivate_below_c: 65.0,
            min_battery_fraction: 0.05,
            critical_battery_fraction: 0.03,
            hot_side_limit_c: 90.0,
            hot_side_cutoff_c: 95.0,
            post_purge_window_s: 60,
            hot_side_thermal_mass_j_per_c: 50.0,
            hot_side_dissipation_w_per_c: 1.0,
            hot_side_relax_per_s: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Co2Config {
    /// Energy held by a full canister (J).
    pub canister_capacity_j: f64,

    /// Fraction of a full canister released by one purge.
    pub purge_efficiency: f64,

    /// Conduction from the cold canister body after a purge (W).
    pub conduction_w: f64,
    pub conduction_duration_s: u64,

    /// Cooling delivered per second of open valve during a hiss (J/s).
    pub hiss_rate_j_per_s: f64,

    pub bursts: BurstSchedule,

    /// Fraction of capacity below which the emergency threshold also
    /// triggers a purge.
    pub low_fuel_fraction: f64,

    /// A canister below this is considered spent (J).
    pub min_usable_j: f64,
}

impl Default for Co2Config {
    fn default() -> Self {
        Self {
            canister_capacity_j: 2900.0,
            purge_efficiency: 0.85,
            conduction_w: 2.2,
            conduction_duration_s: 180,
            hiss_rate_j_per_s: 3.0,
            bursts: BurstSchedule::default(),
            low_fuel_fraction: 0.10,
            min_usable_j: 50.0,
        }
    }
}

/// Microburst timing for one temperature band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Burst {
    pub duration_s: f64,
    pub cycle_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstBand {
    /// Band applies strictly below this temperature.
    pub below_c: f64,
    #[serde(flatten)]
    pub burst: Burst,
}

/// Hotter means longer, more frequent bursts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstSchedule {
    /// Ascending by `below_c`; the first matching band wins.
    pub bands: Vec<BurstBand>,
    /// Used at or above the last band.
    pub above: Burst,
}

impl Default for BurstSchedule {
    fn default() -> Self {
        let band = |below_c, duration_s, cycle_s| BurstBand {
            below_c,
            burst: Burst {
                duration_s,
                cycle_s,
            },
        };
        Self {
            bands: vec![band(60.0, 0.3, 8.0), band(70.0, 0.5, 5.0), band(75.0, 0.7, 4.0)],
            above: Burst {
                duration_s: 1.0,
                cycle_s: 3.0,
            },
        }
    }
}

impl BurstSchedule {
    pub fn lookup(&self, temperature_c: f64) -> Burst {
        self.bands
            .iter()
            .find(|band| temperature_c < band.below_c)
            .map(|band| band.burst)
            .unwrap_or(self.above)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub capacity_wh: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self { capacity_wh: 60.0 }
    }
}

/// Per-mechanism switches. Turning everything off leaves a bare heated
/// mass, which is useful for checking the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subsystems {
    pub passive: bool,
    pub fan: bool,
    pub peltier: bool,
    pub hiss: bool,
    pub purge: bool,
}

impl Default for Subsystems {
    fn default() -> Self {
        Self {
            passive: true,
            fan: true,
            peltier: true,
            hiss: true,
            purge: true,
        }
    }
}

impl Subsystems {
    pub fn none() -> Self {
        Self {
            passive: false,
            fan: false,
            peltier: false,
            hiss: false,
            purge: false,
        }
    }
}

/// Behaviours the historical variants disagree on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub fan_boosts_peltier: bool,
    pub fan_boosts_purge: bool,
    pub supply: CanisterSupply,
    pub burst_trigger: BurstTrigger,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fan_boosts_peltier: true,
            fan_boosts_purge: true,
            supply: CanisterSupply::Finite {
                halt_when_empty: false,
            },
            burst_trigger: BurstTrigger::WithinStep,
        }
    }
}

/// What happens once both canisters are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanisterSupply {
    /// No more CO₂. Either stop the run or carry on without it.
    Finite { halt_when_empty: bool },
    /// Both canisters are topped up and canister 0 becomes active.
    Refill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstTrigger {
    /// Fire only when elapsed time is an exact multiple of the cycle.
    CycleStart,
    /// Fire when a cycle boundary falls inside the current step.
    WithinStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    pub vessel_volume_m3: f64,

    /// Relief valve set point (Pa).
    pub relief_pa: f64,

    /// Injections are held at or above this; waste venting starts above
    /// it when the device is cool (Pa).
    pub vent_threshold_pa: f64,

    /// Venting never drops below this, keeping moisture out (Pa).
    pub moisture_floor_pa: f64,

    /// Pressure at which the fan gains nothing from the gas (Pa).
    pub reference_pa: f64,

    pub max_fan_factor: f64,

    pub injection_mol_per_s: f64,

    pub vent_hold_s: u64,
    pub purge_hold_s: u64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            vessel_volume_m3: 0.0025,
            relief_pa: 5.0e5,
            vent_threshold_pa: 2.5e5,
            moisture_floor_pa: 1.1e5,
            reference_pa: 1.0e5,
            max_fan_factor: 2.0,
            injection_mol_per_s: 0.005,
            vent_hold_s: 10,
            purge_hold_s: 30,
        }
    }
}

/// Settings used only when driving real actuators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// How long the valve stays open for a purge (s).
    pub purge_valve_open_s: f64,

    pub filter_window: u8,
    pub filter_max_deviation_c: f32,
    pub sensor_min_c: f32,
    pub sensor_max_c: f32,

    /// After this many rejected readings in a row the filter assumes a
    /// genuine step change and starts over.
    pub filter_max_rejections: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            purge_valve_open_s: 1.5,
            filter_window: 5,
            filter_max_deviation_c: 5.0,
            sensor_min_c: -20.0,
            sensor_max_c: 110.0,
            filter_max_rejections: 3,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Number of steps in a full-length run.
    pub fn total_steps(&self) -> u64 {
        self.total_duration_s
            .checked_div(self.time_step_s)
            .unwrap_or(0)
    }

    /// Energy released by one purge (J).
    pub fn effective_purge_j(&self) -> f64 {
        self.co2.canister_capacity_j * self.co2.purge_efficiency
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("thermal.thermal_mass_j_per_c", self.thermal.thermal_mass_j_per_c)?;
        positive("time_step_s", self.time_step_s as f64)?;
        positive("co2.canister_capacity_j", self.co2.canister_capacity_j)?;
        positive("battery.capacity_wh", self.battery.capacity_wh)?;
        positive(
            "peltier.hot_side_thermal_mass_j_per_c",
            self.peltier.hot_side_thermal_mass_j_per_c,
        )?;

        within("co2.purge_efficiency", self.co2.purge_efficiency, 0.0, 1.0)?;
        if self.co2.purge_efficiency == 0.0 {
            return Err(ConfigError::NonPositive {
                field: "co2.purge_efficiency",
                value: 0.0,
            });
        }
        within("co2.low_fuel_fraction", self.co2.low_fuel_fraction, 0.0, 1.0)?;
        within(
            "peltier.min_battery_fraction",
            self.peltier.min_battery_fraction,
            0.0,
            1.0,
        )?;
        within(
            "peltier.critical_battery_fraction",
            self.peltier.critical_battery_fraction,
            0.0,
            1.0,
        )?;
        within("peltier.efficiency_base", self.peltier.efficiency_base, 0.0, 1.0)?;
        if let Some(fraction) = self.thermal.floor_fraction_of_ambient {
            within("thermal.floor_fraction_of_ambient", fraction, 0.0, 1.0)?;
        }

        non_negative("co2.min_usable_j", self.co2.min_usable_j)?;
        non_negative("co2.hiss_rate_j_per_s", self.co2.hiss_rate_j_per_s)?;
        non_negative("co2.conduction_w", self.co2.conduction_w)?;
        non_negative("peltier.max_cooling_w", self.peltier.max_cooling_w)?;
        non_negative(
            "hardware.purge_valve_open_s",
            self.hardware.purge_valve_open_s,
        )?;
        let bursts = &self.co2.bursts;
        for burst in bursts.bands.iter().map(|band| &band.burst).chain([&bursts.above]) {
            non_negative("co2.bursts.duration_s", burst.duration_s)?;
            non_negative("co2.bursts.cycle_s", burst.cycle_s)?;
        }

        ordered(
            "thermal.emergency_temp_c",
            self.thermal.emergency_temp_c,
            "thermal.critical_temp_c",
            self.thermal.critical_temp_c,
        )?;
        ordered(
            "peltier.deactivate_below_c",
            self.peltier.deactivate_below_c,
            "peltier.activate_above_c",
            self.peltier.activate_above_c,
        )?;
        ordered(
            "peltier.hot_side_limit_c",
            self.peltier.hot_side_limit_c,
            "peltier.hot_side_cutoff_c",
            self.peltier.hot_side_cutoff_c,
        )?;
        ordered(
            "fan.passive_below_c",
            self.fan.passive_below_c,
            "fan.warning_below_c",
            self.fan.warning_below_c,
        )?;
        ordered(
            "fan.warning_below_c",
            self.fan.warning_below_c,
            "fan.high_above_c",
            self.fan.high_above_c,
        )?;

        let ascending = self
            .co2
            .bursts
            .bands
            .windows(2)
            .all(|pair| pair[0].below_c < pair[1].below_c);
        if !ascending {
            return Err(ConfigError::UnorderedBurstBands);
        }

        if let Some(pressure) = &self.pressure {
            positive("pressure.vessel_volume_m3", pressure.vessel_volume_m3)?;
            positive("pressure.reference_pa", pressure.reference_pa)?;
            ordered(
                "pressure.moisture_floor_pa",
                pressure.moisture_floor_pa,
                "pressure.relief_pa",
                pressure.relief_pa,
            )?;
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    within(field, value, 0.0, f64::MAX)
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn ordered(
    lower_field: &'static str,
    lower: f64,
    upper_field: &'static str,
    upper: f64,
) -> Result<(), ConfigError> {
    if lower < upper {
        Ok(())
    } else {
        Err(ConfigError::Inverted {
            lower_field,
            lower,
            upper_field,
            upper,
        })
    }
}
