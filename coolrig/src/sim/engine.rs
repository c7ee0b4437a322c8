//! The per-step cooling decision and integration engine.
//!
//! Each step runs in a fixed order: read the workload, work out the
//! post-purge window, gather the unboosted cooling contributions (passive,
//! canister conduction, hiss, Peltier), update the fan, evaluate purge and
//! canister supply, draw the burst from whichever canister is then
//! active, integrate temperature, and finally account for the battery,
//! the log and the ledger.

use crate::config::{PassiveModel, SimulationConfig};
use crate::error::ConfigError;
use crate::thermal::{
    BandLimits, Co2Subsystem, FanController, FanMode, PeltierController, PressureModel,
    PurgeOutcome, ResourceStore, SupplyOutcome, ThermalBand, ThermalState,
};
use crate::tracing::prelude::*;

use super::events::{EventKind, EventLog, SimEvent};
use super::summary::{CoolingLedger, Summary, Termination};
use super::workload::Workload;

/// What happened during one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Simulation time at the start of the step.
    pub timestamp_s: u64,
    pub temperature_c: f64,
    pub heat_w: f64,
    /// Total fan-boosted cooling applied by the integration (W).
    pub cooling_w: f64,
    pub fan_duty: f64,
    pub fan_mode: FanMode,
    pub fan_multiplier: f64,
    pub peltier_active: bool,
    /// Length of the microburst released this step, if any (s).
    pub burst_s: Option<f64>,
    pub purged: bool,
    /// Set on the step that ended the run.
    pub termination: Option<Termination>,
}

/// One independent simulation run. All mutable state lives here.
pub struct Simulation {
    config: SimulationConfig,
    workload: Box<dyn Workload>,
    thermal: ThermalState,
    resources: ResourceStore,
    fan: FanController,
    peltier: PeltierController,
    co2: Co2Subsystem,
    pressure: Option<PressureModel>,
    band: ThermalBand,
    limits: BandLimits,
    series: Vec<(u64, f64)>,
    events: EventLog,
    ledger: CoolingLedger,
    steps: u64,
    total_steps: u64,
    termination: Option<Termination>,
}

impl Simulation {
    /// Validate `config` and set up a run driven by its configured
    /// workload.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let workload = config
            .workload
            .build(config.thermal.cpu_power_w, config.total_duration_s);
        Ok(Self::assemble(config, workload))
    }

    /// Like [`Simulation::new`] but with a caller-supplied workload.
    pub fn with_workload(
        config: SimulationConfig,
        workload: impl Workload + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, Box::new(workload)))
    }

    fn assemble(config: SimulationConfig, workload: Box<dyn Workload>) -> Self {
        let limits = BandLimits {
            warm_c: config.fan.warning_below_c,
            emergency_c: config.thermal.emergency_temp_c,
            critical_c: config.thermal.critical_temp_c,
            hysteresis_c: config.thermal.band_hysteresis_c,
        };
        let initial = config.thermal.initial_temp_c;
        let total_steps = config.total_steps();

        Self {
            workload,
            thermal: ThermalState::new(initial),
            resources: ResourceStore::new(config.co2.canister_capacity_j, config.battery.capacity_wh),
            fan: FanController::new(config.fan.clone(), config.co2.conduction_duration_s),
            peltier: PeltierController::new(config.peltier.clone(), config.battery.capacity_wh),
            co2: Co2Subsystem::new(&config),
            pressure: config
                .pressure
                .clone()
                .map(|pressure| PressureModel::new(pressure, initial)),
            band: ThermalBand::from_temperature(initial, ThermalBand::Nominal, &limits),
            limits,
            series: Vec::with_capacity(total_steps.min(1 << 20) as usize),
            events: EventLog::new(),
            ledger: CoolingLedger::default(),
            steps: 0,
            total_steps,
            termination: (total_steps == 0).then_some(Termination::Completed),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn thermal(&self) -> &ThermalState {
        &self.thermal
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    pub fn fan(&self) -> &FanController {
        &self.fan
    }

    pub fn peltier(&self) -> &PeltierController {
        &self.peltier
    }

    pub fn pressure(&self) -> Option<&PressureModel> {
        self.pressure.as_ref()
    }

    pub fn band(&self) -> ThermalBand {
        self.band
    }

    /// `(timestamp_s, temperature_c)`, one sample per step.
    pub fn series(&self) -> &[(u64, f64)] {
        &self.series
    }

    pub fn events(&self) -> &[SimEvent] {
        self.events.events()
    }

    pub fn ledger(&self) -> &CoolingLedger {
        &self.ledger
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// Advance one time step, integrating the temperature.
    ///
    /// Once the run has finished this does nothing and reports the current
    /// state.
    pub fn step(&mut self) -> StepResult {
        self.advance(None)
    }

    /// Run the policy pass against a measured device temperature instead
    /// of the integrated one. Used when driving real hardware.
    ///
    /// Measured steps do not count toward `total_duration_s`: a hardware
    /// run only ends on battery depletion or an exhausted, halting supply.
    pub fn step_measured(&mut self, temperature_c: f64) -> StepResult {
        self.advance(Some(temperature_c))
    }

    pub fn run_to_completion(&mut self) -> Summary {
        while !self.is_finished() {
            self.step();
        }
        self.summary()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            termination: self.termination.unwrap_or(Termination::Completed),
            steps: self.steps,
            simulated_s: self.thermal.elapsed_s,
            final_temp_c: self.thermal.temperature_c,
            peak_temp_c: self.thermal.peak_temp_c,
            purge_count: self.resources.purge_count(),
            canister_swap_count: self.resources.swap_count(),
            refill_count: self.resources.refill_count(),
            active_canister: self.resources.active_index(),
            canisters_j: self.resources.canisters(),
            co2_spent_j: self.resources.co2_spent_j(),
            battery_wh: self.resources.battery_wh(),
            battery_fraction: self.resources.battery_fraction(),
            ledger: self.ledger,
            shares: self.ledger.shares(),
        }
    }

    fn advance(&mut self, measured_c: Option<f64>) -> StepResult {
        if self.is_finished() {
            return self.idle_result();
        }

        let dt_s = self.config.time_step_s;
        let dt = dt_s as f64;
        let t = self.thermal.elapsed_s;
        let subsystems = self.config.subsystems;
        let policy = self.config.policy;

        if let Some(temperature_c) = measured_c {
            self.thermal.temperature_c = temperature_c;
        }
        let temp = self.thermal.temperature_c;
        let battery_ok = !self.resources.battery_depleted();

        // Heat in and post-purge window.
        let heat_w = self.workload.power_w(t).max(0.0);
        let post_purge_remaining = self
            .thermal
            .post_purge_remaining_s(self.config.co2.conduction_duration_s);
        let is_post_purge = post_purge_remaining.is_some();

        // Unboosted contributions.
        let passive_w = if subsystems.passive {
            self.passive_w(temp)
        } else {
            0.0
        };
        let conduction_w = self.co2.conduction_w(is_post_purge);
        let burst_s = if subsystems.hiss && self.injection_allowed(temp, t) {
            self.co2
                .burst_due(temp, t, dt_s, self.resources.active_energy_j())
        } else {
            None
        };

        if subsystems.peltier && battery_ok {
            self.peltier.update(
                temp,
                self.resources.battery_wh(),
                self.thermal.hot_side_temp_c,
                self.thermal.time_since_purge_s(),
            );
        } else {
            self.peltier.force_off();
        }
        let peltier = self.peltier.operate(&mut self.thermal, dt_s);

        // Fan.
        let fan_duty = if subsystems.fan && battery_ok {
            self.fan.update(temp, is_post_purge, t, dt_s)
        } else {
            self.fan.force_off();
            0.0
        };
        let fan_multiplier = self.fan_multiplier(
            fan_duty,
            is_post_purge,
            post_purge_remaining.unwrap_or(0.0),
            temp,
        );
        let peltier_multiplier = if policy.fan_boosts_peltier {
            fan_multiplier
        } else {
            1.0
        };

        // Purge, then canister supply.
        let mut purged = false;
        if subsystems.purge {
            let purge_multiplier = if policy.fan_boosts_purge {
                fan_multiplier
            } else {
                1.0
            };
            purged = self.purge(purge_multiplier, fan_duty);
        }
        self.check_supply();

        // Burst from whichever canister is active now.
        let hiss_j = match burst_s {
            Some(duration_s) => {
                let drawn = self.resources.draw(self.co2.burst_energy_j(duration_s));
                if drawn > 0.0 {
                    self.inject(duration_s);
                }
                drawn
            }
            None => 0.0,
        };
        let burst_s = burst_s.filter(|_| hiss_j > 0.0);
        let hiss_w = hiss_j / dt;

        // Integrate.
        let base_w = passive_w + conduction_w + hiss_w;
        let cooling_w =
            (base_w * fan_multiplier + peltier.cooling_w * peltier_multiplier).max(0.0);
        if measured_c.is_none() {
            let delta = (heat_w - cooling_w) * dt / self.config.thermal.thermal_mass_j_per_c;
            self.thermal.temperature_c += delta;
        }
        if let Some(fraction) = self.config.thermal.floor_fraction_of_ambient {
            let floor = self.config.thermal.ambient_temp_c * fraction;
            self.thermal.temperature_c = self.thermal.temperature_c.max(floor);
        }

        // Bookkeeping.
        self.resources
            .drain_battery(self.fan.energy_wh(fan_duty, dt_s) + peltier.energy_wh);
        self.thermal.enforce_hot_side_floor();
        self.thermal.record_peak();
        let temperature_c = self.thermal.temperature_c;
        self.series.push((t, temperature_c));
        self.update_band(t, temperature_c);
        self.vent_if_cool(t, temperature_c);
        self.emit_status(t);

        self.ledger.heat_generated_j += heat_w * dt;
        self.ledger.passive_j += passive_w * fan_multiplier * dt;
        self.ledger.conduction_j += conduction_w * fan_multiplier * dt;
        self.ledger.hiss_j += hiss_w * fan_multiplier * dt;
        self.ledger.peltier_j += peltier.cooling_w * peltier_multiplier * dt;
        self.ledger.fan_boost_j += base_w * (fan_multiplier - 1.0) * dt
            + peltier.cooling_w * (peltier_multiplier - 1.0) * dt;

        trace!(
            t,
            temp = temperature_c,
            heat_w,
            cooling_w,
            fan_duty,
            fan_multiplier,
            peltier = self.peltier.is_active(),
            "step"
        );

        self.thermal.elapsed_s += dt_s;
        self.steps += 1;

        if self.resources.battery_depleted() && self.termination.is_none() {
            self.events.record(
                t,
                EventKind::BatteryDepleted {
                    temperature_c,
                },
            );
            self.termination = Some(Termination::BatteryDepleted);
        } else if self.termination.is_none()
            && measured_c.is_none()
            && self.steps >= self.total_steps
        {
            self.termination = Some(Termination::Completed);
        }
        if let Some(termination) = self.termination {
            info!(%termination, steps = self.steps, t = self.thermal.elapsed_s, "run finished");
        }

        StepResult {
            timestamp_s: t,
            temperature_c,
            heat_w,
            cooling_w,
            fan_duty,
            fan_mode: self.fan.mode(),
            fan_multiplier,
            peltier_active: self.peltier.is_active(),
            burst_s,
            purged,
            termination: self.termination,
        }
    }

    fn idle_result(&self) -> StepResult {
        StepResult {
            timestamp_s: self.thermal.elapsed_s,
            temperature_c: self.thermal.temperature_c,
            heat_w: 0.0,
            cooling_w: 0.0,
            fan_duty: self.fan.duty_cycle(),
            fan_mode: self.fan.mode(),
            fan_multiplier: 1.0,
            peltier_active: self.peltier.is_active(),
            burst_s: None,
            purged: false,
            termination: self.termination,
        }
    }

    fn passive_w(&self, temp: f64) -> f64 {
        let thermal = &self.config.thermal;
        let passive_w = match thermal.passive_model {
            PassiveModel::Constant => thermal.passive_dissipation_w,
            PassiveModel::AmbientDelta { reference_delta_c } if reference_delta_c > 0.0 => {
                let rise = (temp - thermal.ambient_temp_c).max(0.0);
                thermal.passive_dissipation_w * rise / reference_delta_c
            }
            PassiveModel::AmbientDelta { .. } => 0.0,
        };
        passive_w.max(0.0)
    }

    fn injection_allowed(&self, temp: f64, t: u64) -> bool {
        self.pressure
            .as_ref()
            .is_none_or(|pressure| pressure.injection_allowed(temp, t))
    }

    fn fan_multiplier(&self, duty: f64, is_post_purge: bool, remaining_s: f64, temp: f64) -> f64 {
        let multiplier = self.fan.multiplier(duty, is_post_purge, remaining_s);
        match &self.pressure {
            Some(pressure) if duty > 0.0 => {
                let raw = self.fan.uncapped_multiplier(duty, is_post_purge, remaining_s);
                self.fan.capped(raw * pressure.fan_factor(temp))
            }
            _ => multiplier,
        }
    }

    fn purge(&mut self, multiplier: f64, fan_duty: f64) -> bool {
        let t = self.thermal.elapsed_s;
        let temperature_before_c = self.thermal.temperature_c;
        let canister = self.resources.active_index();

        match self
            .co2
            .try_purge(&mut self.thermal, &mut self.resources, multiplier)
        {
            PurgeOutcome::NotNeeded => false,
            PurgeOutcome::Executed {
                reason,
                temp_drop_c,
                energy_j,
                canister_after_j,
            } => {
                self.events.record(
                    t,
                    EventKind::Purge {
                        reason,
                        temperature_before_c,
                        temp_drop_c,
                        energy_j,
                        canister,
                        canister_after_j,
                        fan_duty,
                    },
                );
                let removed_j = temp_drop_c * self.config.thermal.thermal_mass_j_per_c;
                self.ledger.purge_j += removed_j;
                self.ledger.fan_boost_j += removed_j - energy_j;

                if let Some(pressure) = self.pressure.as_mut() {
                    let vent = pressure.vent_after_purge(self.thermal.temperature_c, t);
                    self.events.record(
                        t,
                        EventKind::PressureVent {
                            from_pa: vent.from_pa,
                            to_pa: vent.to_pa,
                            after_purge: true,
                        },
                    );
                }
                true
            }
            PurgeOutcome::Skipped {
                reason,
                available_j,
                required_j,
                first_in_episode,
            } => {
                if first_in_episode {
                    warn!(
                        t,
                        %reason,
                        temp = temperature_before_c,
                        available_j,
                        required_j,
                        "purge skipped, active canister too low"
                    );
                }
                self.events.record(
                    t,
                    EventKind::PurgeSkipped {
                        reason,
                        temperature_c: temperature_before_c,
                        available_j,
                        required_j,
                    },
                );
                false
            }
        }
    }

    fn check_supply(&mut self) {
        let t = self.thermal.elapsed_s;
        match self.co2.check_supply(&mut self.resources) {
            SupplyOutcome::Unchanged => {}
            SupplyOutcome::Swapped { from, to } => self.events.record(
                t,
                EventKind::Swap {
                    from,
                    to,
                    energy_j: self.resources.active_energy_j(),
                },
            ),
            SupplyOutcome::Refilled => self.events.record(
                t,
                EventKind::Refill {
                    refill_count: self.resources.refill_count(),
                },
            ),
            SupplyOutcome::Exhausted { newly } => {
                if newly {
                    self.events.record(
                        t,
                        EventKind::CanistersExhausted {
                            canisters: self.resources.canisters(),
                        },
                    );
                }
                if self.co2.halts_when_empty() {
                    self.termination = Some(Termination::CanistersExhausted);
                }
            }
        }
    }

    fn inject(&mut self, burst_s: f64) {
        let t = self.thermal.elapsed_s;
        let temp = self.thermal.temperature_c;
        if let Some(pressure) = self.pressure.as_mut() {
            if pressure.inject(burst_s, temp) {
                let pressure_pa = pressure.pressure_pa(temp);
                self.events
                    .record(t, EventKind::ReliefValve { pressure_pa });
            }
        }
    }

    fn vent_if_cool(&mut self, t: u64, temp: f64) {
        let cool_below_c = self.config.fan.warning_below_c;
        let Some(pressure) = self.pressure.as_mut() else {
            return;
        };
        if let Some(vent) = pressure.maybe_vent(temp, cool_below_c, t) {
            self.events.record(
                t,
                EventKind::PressureVent {
                    from_pa: vent.from_pa,
                    to_pa: vent.to_pa,
                    after_purge: false,
                },
            );
        }
    }

    fn update_band(&mut self, t: u64, temperature_c: f64) {
        let band = ThermalBand::from_temperature(temperature_c, self.band, &self.limits);
        if band != self.band {
            self.events.record(
                t,
                EventKind::BandChange {
                    from: self.band,
                    to: band,
                    temperature_c,
                },
            );
            self.band = band;
        }
    }

    fn emit_status(&mut self, t: u64) {
        let interval = self.config.status_interval_s;
        if interval == 0 || t == 0 || t % interval >= self.config.time_step_s {
            return;
        }
        self.events.record(
            t,
            EventKind::Status {
                temperature_c: self.thermal.temperature_c,
                fan_duty: self.fan.duty_cycle(),
                fan_mode: self.fan.mode(),
                peltier_active: self.peltier.is_active(),
                battery_fraction: self.resources.battery_fraction(),
                active_canister: self.resources.active_index(),
                canisters: self.resources.canisters(),
            },
        );
    }

    #[cfg(test)]
    pub fn set_temperature(&mut self, temperature_c: f64) {
        self.thermal.temperature_c = temperature_c;
    }

    #[cfg(test)]
    pub fn set_canisters(&mut self, canisters: [f64; 2]) {
        self.resources.set_canisters(canisters);
    }

    #[cfg(test)]
    pub fn set_battery_wh(&mut self, battery_wh: f64) {
        self.resources.set_battery_wh(battery_wh);
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("thermal", &self.thermal)
            .field("resources", &self.resources)
            .field("steps", &self.steps)
            .field("termination", &self.termination)
            .finish_non_exhaustive()
    }
}
