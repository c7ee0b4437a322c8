//! CO₂ cooling: scheduled microbursts ("hiss"), emergency purges and
//! canister management.
//!
//! Nothing here fails. A purge that cannot be paid for is reported as
//! skipped and the caller moves on to [`Co2Subsystem::check_supply`],
//! which may swap or refill the canisters.

use serde::Serialize;

use crate::config::{BurstTrigger, CanisterSupply, Co2Config, SimulationConfig};

use super::{resources::ResourceStore, state::ThermalState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurgeReason {
    /// Device above the critical threshold.
    Critical,
    /// Above the emergency threshold with the active canister running low.
    LowFuelEmergency,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PurgeOutcome {
    NotNeeded,
    Executed {
        reason: PurgeReason,
        temp_drop_c: f64,
        energy_j: f64,
        canister_after_j: f64,
    },
    Skipped {
        reason: PurgeReason,
        available_j: f64,
        required_j: f64,
        /// First skip since the last purge or since conditions cleared.
        first_in_episode: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyOutcome {
    Unchanged,
    Swapped { from: usize, to: usize },
    Refilled,
    /// Both canisters below the usable threshold with no refill.
    Exhausted { newly: bool },
}

#[derive(Debug, Clone)]
pub struct Co2Subsystem {
    config: Co2Config,
    trigger: BurstTrigger,
    supply: CanisterSupply,
    critical_temp_c: f64,
    emergency_temp_c: f64,
    thermal_mass_j_per_c: f64,
    effective_purge_j: f64,
    skipping: bool,
    exhausted: bool,
}

impl Co2Subsystem {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.co2.clone(),
            trigger: config.policy.burst_trigger,
            supply: config.policy.supply,
            critical_temp_c: config.thermal.critical_temp_c,
            emergency_temp_c: config.thermal.emergency_temp_c,
            thermal_mass_j_per_c: config.thermal.thermal_mass_j_per_c,
            effective_purge_j: config.effective_purge_j(),
            skipping: false,
            exhausted: false,
        }
    }

    pub fn effective_purge_j(&self) -> f64 {
        self.effective_purge_j
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Burst duration (s) if a microburst fires this step.
    pub fn burst_due(
        &self,
        temperature_c: f64,
        elapsed_s: u64,
        time_step_s: u64,
        active_energy_j: f64,
    ) -> Option<f64> {
        let burst = self.config.bursts.lookup(temperature_c);
        if active_energy_j <= 0.0 || burst.cycle_s <= 0.0 || burst.duration_s <= 0.0 {
            return None;
        }

        let phase = elapsed_s as f64 % burst.cycle_s;
        let due = match self.trigger {
            BurstTrigger::CycleStart => phase == 0.0,
            BurstTrigger::WithinStep => phase < time_step_s as f64,
        };
        due.then_some(burst.duration_s)
    }

    /// Energy a burst of `duration_s` releases (J).
    pub fn burst_energy_j(&self, duration_s: f64) -> f64 {
        duration_s * self.config.hiss_rate_j_per_s
    }

    /// Residual cooling from the cold canister while the post-purge window
    /// is open (W).
    pub fn conduction_w(&self, is_post_purge: bool) -> f64 {
        if is_post_purge {
            self.config.conduction_w
        } else {
            0.0
        }
    }

    pub fn purge_trigger(&self, temperature_c: f64, active_energy_j: f64) -> Option<PurgeReason> {
        let low_fuel =
            active_energy_j < self.config.canister_capacity_j * self.config.low_fuel_fraction;

        if temperature_c > self.critical_temp_c {
            Some(PurgeReason::Critical)
        } else if temperature_c > self.emergency_temp_c && low_fuel {
            Some(PurgeReason::LowFuelEmergency)
        } else {
            None
        }
    }

    /// Purge if conditions call for it and the active canister can pay for
    /// a full one. `fan_multiplier` scales the resulting temperature drop.
    pub fn try_purge(
        &mut self,
        state: &mut ThermalState,
        resources: &mut ResourceStore,
        fan_multiplier: f64,
    ) -> PurgeOutcome {
        let available_j = resources.active_energy_j();
        let Some(reason) = self.purge_trigger(state.temperature_c, available_j) else {
            self.skipping = false;
            return PurgeOutcome::NotNeeded;
        };

        if available_j < self.effective_purge_j {
            let first_in_episode = !self.skipping;
            self.skipping = true;
            return PurgeOutcome::Skipped {
                reason,
                available_j,
                required_j: self.effective_purge_j,
                first_in_episode,
            };
        }

        let energy_j = resources.draw(self.effective_purge_j);
        let temp_drop_c = energy_j / self.thermal_mass_j_per_c * fan_multiplier.max(1.0);
        state.temperature_c -= temp_drop_c;
        state.last_purge_s = Some(state.elapsed_s);
        resources.record_purge();
        self.skipping = false;

        PurgeOutcome::Executed {
            reason,
            temp_drop_c,
            energy_j,
            canister_after_j: resources.active_energy_j(),
        }
    }

    /// Swap or refill once the active canister is no longer usable.
    pub fn check_supply(&mut self, resources: &mut ResourceStore) -> SupplyOutcome {
        let threshold = self.config.min_usable_j;
        if resources.active_energy_j() >= threshold {
            return SupplyOutcome::Unchanged;
        }

        if resources.other_energy_j() > threshold {
            let from = resources.active_index();
            let to = resources.swap_to_other();
            self.exhausted = false;
            return SupplyOutcome::Swapped { from, to };
        }

        match self.supply {
            CanisterSupply::Refill => {
                resources.refill();
                self.exhausted = false;
                SupplyOutcome::Refilled
            }
            CanisterSupply::Finite { .. } => {
                let newly = !self.exhausted;
                self.exhausted = true;
                SupplyOutcome::Exhausted { newly }
            }
        }
    }

    /// Whether an exhausted supply ends the run.
    pub fn halts_when_empty(&self) -> bool {
        matches!(
            self.supply,
            CanisterSupply::Finite {
                halt_when_empty: true
            }
        )
    }
}
